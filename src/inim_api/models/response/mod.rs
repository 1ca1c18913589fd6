pub mod api_response;
pub mod register_client_response;
