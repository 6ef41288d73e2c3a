//! vigild — Vigil vision sensor node daemon.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use vigil_core::{NodeConfig, NodeIdentity, TelemetrySink};
use vigil_stream::{events, post, BroadcastHub, PostState, StreamServer};
use vigil_vision::FrameAnalyzer;

use vigild::capture::{CaptureWorkflow, Notifier};
use vigild::control::EventLoop;
use vigild::dispatch::FanoutDispatcher;
use vigild::tick::{StreamOutput, TickScheduler};
use vigild::{source, udp};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = NodeConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = NodeConfig::load().context("failed to load config")?;

    let node = Arc::new(
        NodeIdentity::load_or_create(&config.identity).context("failed to load node identity")?,
    );
    tracing::info!(hostname = %node.hostname, unique_id = %node.unique_id, "vigild starting");
    tracing::info!(
        blobs = config.detection.blobs,
        contours = config.detection.contours,
        brightest_pixel = config.detection.brightest_pixel,
        sync_video = config.video.sync_video,
        "detection modes"
    );

    let (event_tx, event_rx) = events::channel(256);

    // ── Surfaces ─────────────────────────────────────────────────────────────

    let hub = config
        .sinks
        .ws
        .then(|| BroadcastHub::new(config.stream.ws_queue, event_tx.clone()));
    let stream = config
        .sinks
        .mjpeg
        .then(|| StreamServer::new(config.stream.clone(), event_tx.clone()));

    // Telemetry fan-out
    let dispatcher = {
        let mut d = FanoutDispatcher::new();
        if config.sinks.udp {
            let sink = udp::UdpSink::connect(&config.network.udp_host, config.network.udp_port)
                .context("failed to open udp sink")?;
            d.register(Arc::new(sink) as Arc<dyn TelemetrySink>);
        }
        if let Some(hub) = &hub {
            d.register(hub.clone() as Arc<dyn TelemetrySink>);
        }
        Arc::new(d)
    };

    // Tick
    let source = source::from_config(&config.camera).context("failed to open frame source")?;
    let analyzer = FrameAnalyzer::new(
        node.clone(),
        config.detection.clone(),
        config.video.clone(),
    );
    let mut tick = TickScheduler::new(source, analyzer, dispatcher.clone(), config.tick.framerate);
    if let Some(server) = &stream {
        let (width, height) = config.stream_dimensions();
        tick = tick.with_stream(
            server.clone(),
            StreamOutput {
                width,
                height,
                quality: config.stream.quality,
            },
        );
    }
    let snapshot = tick.snapshot();
    let running = tick.running();
    let tick_stats = tick.stats();

    // Capture
    let capture = CaptureWorkflow::new(
        node.clone(),
        &config.capture,
        snapshot,
        hub.clone().map(|h| h as Arc<dyn Notifier>),
    );
    capture.prepare().context("failed to prepare document root")?;

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        let running = running.clone();
        let stream = stream.clone();
        let hub = hub.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            running.store(false, Ordering::Release);
            if let Some(s) = &stream {
                s.close_all();
            }
            if let Some(h) = &hub {
                h.close_all();
            }
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let tick_thread = tick.spawn().context("failed to spawn tick thread")?;

    let event_task = tokio::spawn(
        EventLoop::new(event_rx, capture.clone(), hub.clone(), shutdown_tx.subscribe()).run(),
    );

    let stream_task = {
        let server = stream.clone();
        let bind = config.network.bind.clone();
        let port = config.network.stream_port;
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let Some(server) = server else {
                return std::future::pending::<()>().await;
            };
            if let Err(e) = vigil_stream::serve("stream", server.router(), &bind, port, shutdown).await {
                tracing::error!(error = %e, "stream server failed");
            }
        })
    };

    let ws_task = {
        let hub = hub.clone();
        let bind = config.network.bind.clone();
        let port = config.network.ws_port;
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let Some(hub) = hub else {
                return std::future::pending::<()>().await;
            };
            if let Err(e) = vigil_stream::serve("ws", hub.router(), &bind, port, shutdown).await {
                tracing::error!(error = %e, "ws server failed");
            }
        })
    };

    let post_task = {
        let state = PostState {
            node: node.clone(),
            events: event_tx.clone(),
            stream: stream.clone(),
            hub: hub.clone(),
            capture: capture.clone(),
            index_name: config.capture.index_name.clone(),
        };
        let app = post::router(state, &config.capture.document_root);
        let bind = config.network.bind.clone();
        let port = config.network.post_port;
        let enabled = config.sinks.post;
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if !enabled {
                return std::future::pending::<()>().await;
            }
            if let Err(e) = vigil_stream::serve("post", app, &bind, port, shutdown).await {
                tracing::error!(error = %e, "post server failed");
            }
        })
    };

    let stats_printer = {
        let dispatcher = dispatcher.clone();
        let stream = stream.clone();
        let hub = hub.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                tracing::info!(
                    ticks = tick_stats.ticks.load(Ordering::Relaxed),
                    skipped = tick_stats.skipped.load(Ordering::Relaxed),
                    source_errors = tick_stats.source_errors.load(Ordering::Relaxed),
                    messages = dispatcher.messages(),
                    stream_clients = stream.as_ref().map_or(0, |s| s.active()),
                    stream_evicted = stream.as_ref().map_or(0, |s| s.evicted()),
                    ws_sessions = hub.as_ref().map_or(0, |h| h.sessions()),
                    ws_evicted = hub.as_ref().map_or(0, |h| h.evicted()),
                    "node stats"
                );
                for c in dispatcher.counters() {
                    tracing::info!(sink = c.name, delivered = c.delivered, failed = c.failed, "  sink");
                }
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = event_task          => tracing::error!("event loop exited: {:?}", r),
        r = stream_task         => tracing::error!("stream server exited: {:?}", r),
        r = ws_task             => tracing::error!("ws server exited: {:?}", r),
        r = post_task           => tracing::error!("post server exited: {:?}", r),
        r = stats_printer       => tracing::error!("stats printer exited: {:?}", r),
    }

    running.store(false, Ordering::Release);
    if tick_thread.join().is_err() {
        tracing::error!("tick thread panicked");
    }
    Ok(())
}
