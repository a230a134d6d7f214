//! `clarion ask` — Route one message through the pipeline.

use clarion_core::{ConversationContext, Request};
use clarion_pipeline::Enhancer;
use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn run(
    path: Option<&Path>,
    message: Option<String>,
    context: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(path)?;
    let enhancer = Enhancer::from_config(&config)?;

    let text = match message {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut request = Request::new(text);
    if let Some(reference) = context {
        request = request.with_context(ConversationContext::reference(reference));
    }

    // Ctrl-C abandons pending enhancement; the answer is still printed.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, abandoning pending enhancement calls");
            on_interrupt.cancel();
        }
    });

    let envelope = enhancer.process_with_cancel(request, cancel).await;
    tracing::debug!(
        request_id = %envelope.transparency_record.request_id,
        degraded = envelope.transparency_record.degraded(),
        "Response ready"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{}", envelope.rendered_text);
    }

    Ok(())
}
