pub mod api_request;
