#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use domain::models::Action;
use domain::models::Event;
use infrastructure::api::petbuddy::PetBuddy;
use infrastructure::stream::websocket::LiveStreamService;
use infrastructure::stream::websocket::StreamSettings;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use yansi::Paint;

use crate::application::cli;
use crate::application::ui;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::services::actions::ActionsService;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        Paint::red(format!(
            "Oh no! Kibble has failed with the following app version and error.\n\nVersion: {}\nCommit: {}\nError: {}",
            env!("CARGO_PKG_VERSION"),
            env!("VERGEN_GIT_DESCRIBE"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        ui::destruct_terminal_for_panic();
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let debug_log_dir = env::var("KIBBLE_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap()
            .join("kibble")
            .to_string_lossy()
            .to_string();
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("kibble")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let ready_res = cli::parse().await;
    if let Err(ready_err) = ready_res {
        handle_error(ready_err);
        return;
    }

    let session = ready_res.unwrap();
    if session.is_none() {
        process::exit(0);
    }
    let session = session.unwrap();

    let counterpart_id = Config::get(ConfigKey::Counterpart).parse::<i64>().unwrap();

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let cancel_token = CancellationToken::new();

    let mut background_futures = task::JoinSet::new();

    let actions_session = session.clone();
    let actions_event_tx = event_tx.clone();
    background_futures.spawn(async move {
        return ActionsService::start(
            Box::new(PetBuddy::with_session(&actions_session)),
            Config::get(ConfigKey::CounterpartUsername),
            actions_event_tx,
            &mut action_rx,
        )
        .await;
    });

    let stream_cancel = cancel_token.clone();
    let stream_user_id = session.user_id;
    background_futures.spawn(async move {
        return LiveStreamService::start(
            StreamSettings::default(),
            stream_user_id,
            counterpart_id,
            event_tx,
            stream_cancel,
        )
        .await;
    });

    let ui_future = ui::start(&session, action_tx, event_rx, cancel_token.clone());

    let res = tokio::select!(
        res = background_futures.join_next() => res.unwrap().unwrap(),
        res = ui_future => res,
    );

    cancel_token.cancel();
    while background_futures.join_next().await.is_some() {}

    if res.is_err() {
        ui::destruct_terminal_for_panic();
        handle_error(res.unwrap_err());
    }

    process::exit(0);
}
