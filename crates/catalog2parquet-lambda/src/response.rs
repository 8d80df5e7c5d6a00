// Invocation response
//
// The dispatcher receives `{"statusCode": 200, "body": "..."}` for every event.

use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "ETL Lambda function executed successfully!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub status_code: u16,
    pub body: String,
}

impl InvocationResult {
    pub fn success() -> Self {
        Self {
            status_code: 200,
            body: SUCCESS_MESSAGE.to_string(),
        }
    }
}
