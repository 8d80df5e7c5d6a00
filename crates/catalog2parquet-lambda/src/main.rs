// AWS Lambda binary entry point
//
// The lambda_runtime crate drives the tokio runtime started here.

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    catalog2parquet_lambda::run().await
}
