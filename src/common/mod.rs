pub mod response;

pub use response::{
    ApiResponse, ErrorResponse, RespondOptions, respond_empty, respond_error, respond_success,
};
