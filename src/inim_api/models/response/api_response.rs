use serde::Deserialize;

/// Status code INIM uses for a successful call.
pub const STATUS_OK: i64 = 0;

#[derive(Deserialize, Debug, Clone)]
pub struct ApiResponse<T> {
    #[serde(rename = "Status", default)]
    pub status: i64,
    #[serde(rename = "ErrMsg", default)]
    pub err_msg: Option<String>,
    #[serde(rename = "Data", default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}
