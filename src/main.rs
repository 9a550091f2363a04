use futures::FutureExt;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use zfood_checkout::{
    modules::{
        checkout::coordinator::CheckoutCoordinator,
        payment::gateway::{CallbackGateway, GatewayCallbacks, GatewayCheckout},
    },
    types::{AppEnvironment, Config, Context, ToContext},
};

fn init_tracing(environment: &AppEnvironment) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(environment.default_log_filter()));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

/// No modal can be shown from a terminal, so every payment attempt is dismissed.
fn headless_gateway() -> CallbackGateway {
    CallbackGateway::new(
        Arc::new(|url: String| {
            async move { Err::<(), String>(format!("cannot load {} without a browser", url)) }.boxed()
        }),
        Arc::new(
            |checkout: GatewayCheckout, callbacks: GatewayCallbacks| -> Result<(), String> {
                tracing::warn!("Dismissing gateway order {}", checkout.order.id);
                callbacks.on_dismiss();
                Ok(())
            },
        ),
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => {
            init_tracing(&config.app.environment);
            config
        }
        Err(err) => {
            init_tracing(&AppEnvironment::Development);
            tracing::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let ctx: Arc<Context> = match config.to_context().await {
        Ok(ctx) => Arc::new(ctx),
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut coordinator = CheckoutCoordinator::new(ctx, Arc::new(headless_gateway()));
    let shutdown = coordinator.cancellation_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    if let Err(err) = coordinator.enter(None).await {
        tracing::error!("Failed to load checkout: {}", err);
        return ExitCode::FAILURE;
    }

    match serde_json::to_string_pretty(&coordinator.breakdown()) {
        Ok(breakdown) => {
            println!("{}", breakdown);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("Failed to encode price breakdown: {}", err);
            ExitCode::FAILURE
        }
    }
}
