mod callback;

pub use callback::error_response;
pub use callback::extract_code;
pub use callback::request_line;
pub use callback::success_response;
