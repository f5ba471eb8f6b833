//! Build script for spotcli.
//!
//! Copies the `.env.example` configuration template into the application
//! directory (`~/.config/spotcli/.env.example`) so users find it next to the
//! `.env` file the binary reads.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Re-run if the template changes
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let env_example_path = manifest_dir.join(".env.example");

    let Some(home) = dirs::home_dir() else {
        println!("cargo:warning=no home directory, .env.example not installed");
        return Ok(());
    };
    let out_dir = home.join(".config/spotcli");

    // Only copy if the source exists; otherwise warn instead of failing
    if env_example_path.is_file() {
        fs::create_dir_all(&out_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_dir, fs::Permissions::from_mode(0o700))?;
        }
        let contents = fs::read_to_string(&env_example_path)?;
        fs::write(out_dir.join(".env.example"), contents)?;
    } else {
        println!(
            "cargo:warning=.env.example not found at {}",
            env_example_path.display()
        );
    }

    Ok(())
}
