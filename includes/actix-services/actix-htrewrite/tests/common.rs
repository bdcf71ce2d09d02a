use std::sync::Once;

use actix_web::{
    body::{self, BoxBody},
    dev::ServiceResponse,
};
use tracing_subscriber::FmtSubscriber;

static TRACING: Once = Once::new();

/// Install the tracing subscriber once for the whole test binary.
pub fn setup() {
    TRACING.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");
    });
}

/// Drain a `ServiceResponse` body into a string.
pub async fn get_body(res: ServiceResponse<BoxBody>) -> String {
    let data = body::to_bytes(res.into_body())
        .await
        .expect("missing body");
    String::from_utf8(data.to_vec()).expect("invalid body")
}
