// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch controller: the daemon's main loop.
//!
//! Datagrams are parsed into the batch buffer. A batch is flushed when it
//! fills up, when no line has arrived for the flush timeout, or on
//! SIGHUP/SIGUSR1. SIGTERM, SIGINT and the cancellation token flush and
//! stop.
//!
//! In the foreground the controller writes batches itself. In daemon mode
//! each batch goes to a one-shot batch worker thread that frames it onto
//! the channel of the long-lived writer thread.

use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use hl_core::{parse, BatchBuffer, BatchFull, Clock, Rollover, SpoolLayout, MAX_LINE_SIZE};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::dispatch::{process_batch, ChannelSink, DispatchContext, DispatchError, InlineSink, Sink};
use crate::lifecycle::DaemonError;
use crate::protocol::Message;
use crate::stats::Stats;
use crate::supervisor::{Job, Spawner, Supervisor};
use crate::writer::{WriterSpec, WriterWorker};

/// Where flushed batches go.
pub enum Output<S: Spawner, C: Clock> {
    /// Written by the controller through its own writer.
    Inline(WriterWorker<C>),
    /// Framed onto the channel of a writer thread.
    Streaming(Streaming<S, C>),
}

/// Daemon-mode plumbing: the writer channel and the worker threads.
pub struct Streaming<S: Spawner, C: Clock> {
    channel: Arc<Mutex<UnixStream>>,
    /// Read end, kept so a respawned writer resumes where the last one stopped.
    reader: UnixStream,
    supervisor: Supervisor<S>,
    spec: WriterSpec<C>,
}

impl<S: Spawner, C: Clock> Streaming<S, C> {
    /// Spawn the writer on `reader`; batches are written to `channel`.
    pub fn start(
        channel: UnixStream,
        reader: UnixStream,
        mut supervisor: Supervisor<S>,
        spec: WriterSpec<C>,
    ) -> Result<Self, DaemonError> {
        let writer_end = reader.try_clone().map_err(DaemonError::Channel)?;
        supervisor
            .spawn_writer(spec.job(writer_end))
            .map_err(DaemonError::WriterSpawn)?;
        Ok(Self {
            channel: Arc::new(Mutex::new(channel)),
            reader,
            supervisor,
            spec,
        })
    }

    pub fn supervisor(&self) -> &Supervisor<S> {
        &self.supervisor
    }

    fn respawn_writer(&mut self, stats: &Stats) {
        let reader = match self.reader.try_clone() {
            Ok(reader) => reader,
            Err(e) => {
                warn!(error = %e, "cannot clone writer channel");
                return;
            }
        };
        let spec = &self.spec;
        if self
            .supervisor
            .respawn_writer(std::time::Instant::now(), || spec.job(reader))
        {
            Stats::incr(&stats.writer_respawns);
            warn!("writer respawned");
        }
    }
}

/// Receives, batches and dispatches log lines.
pub struct Controller<S: Spawner, C: Clock> {
    clock: C,
    stats: Arc<Stats>,
    layout: Arc<SpoolLayout>,
    batch: BatchBuffer,
    rollover: Rollover,
    /// Rollover cutoff not yet delivered to the writer.
    pending_cutoff: Option<i64>,
    output: Output<S, C>,
    flush_timeout: Duration,
    reap_interval: Duration,
    max_live_workers: usize,
    backpressure: bool,
}

impl<S: Spawner, C: Clock> Controller<S, C> {
    pub fn new(
        config: &Config,
        layout: SpoolLayout,
        clock: C,
        stats: Arc<Stats>,
        output: Output<S, C>,
    ) -> Self {
        Self {
            clock,
            stats,
            layout: Arc::new(layout),
            batch: BatchBuffer::new(config.batch_size),
            rollover: Rollover::local(),
            pending_cutoff: None,
            output,
            flush_timeout: config.flush_timeout,
            reap_interval: config.reap_interval,
            max_live_workers: config.max_live_workers,
            backpressure: false,
        }
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn log_file(&self) -> Option<&str> {
        self.rollover.name()
    }

    pub fn pending_cutoff(&self) -> Option<i64> {
        self.pending_cutoff
    }

    pub fn output(&self) -> &Output<S, C> {
        &self.output
    }

    /// Serve `socket` until a terminate signal or `shutdown` is cancelled.
    pub async fn run(
        mut self,
        socket: UdpSocket,
        shutdown: CancellationToken,
    ) -> Result<(), DaemonError> {
        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        self.check_rollover().await?;

        let mut buf = vec![0u8; MAX_LINE_SIZE + 1];

        // NOTE: Created outside the loop; select! re-creates branch futures
        // on every iteration.
        let mut reap = tokio::time::interval(self.reap_interval);
        reap.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let flush_timer = tokio::time::sleep(self.flush_timeout);
        tokio::pin!(flush_timer);
        let mut flush_armed = false;

        loop {
            let accepting = self.accepting();
            tokio::select! {
                received = socket.recv_from(&mut buf), if accepting => match received {
                    Ok((len, peer)) => {
                        trace!(%peer, len, "datagram");
                        if self.receive(&buf[..len]).await? {
                            flush_timer.as_mut().reset(Instant::now() + self.flush_timeout);
                            flush_armed = true;
                        }
                    }
                    Err(e) => warn!(error = %e, "receive failed"),
                },

                () = &mut flush_timer, if flush_armed => {
                    flush_armed = false;
                    if !self.batch.is_empty() {
                        debug!(pending = self.batch.len(), "flush timeout");
                        self.flush().await?;
                    }
                }

                _ = reap.tick() => self.housekeeping().await?,

                _ = sighup.recv() => {
                    info!("Received SIGHUP, flushing");
                    self.flush().await?;
                }

                _ = sigusr1.recv() => {
                    info!("Received SIGUSR1, flushing");
                    self.flush().await?;
                }

                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                    break;
                }

                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down...");
                    break;
                }

                () = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.shutdown().await
    }

    /// Handle one datagram. Returns `true` if a line was queued.
    pub async fn receive(&mut self, datagram: &[u8]) -> Result<bool, DaemonError> {
        Stats::incr(&self.stats.datagrams);
        if datagram.len() > MAX_LINE_SIZE {
            Stats::incr(&self.stats.oversized);
            warn!(
                size = datagram.len(),
                max = MAX_LINE_SIZE,
                "discarding oversized datagram"
            );
            return Ok(false);
        }

        let entry = match parse(datagram, self.clock.epoch_secs()) {
            Ok(entry) => entry,
            Err(e) => {
                Stats::incr(&self.stats.malformed);
                warn!("{e}");
                return Ok(false);
            }
        };
        Stats::incr(&self.stats.queued);

        if let Err(BatchFull { entry, .. }) = self.batch.push(entry) {
            self.flush().await?;
            if self.batch.push(entry).is_err() {
                warn!("batch still full after flush, dropping line");
            }
        }
        if self.batch.is_full() {
            self.flush().await?;
        }
        Ok(true)
    }

    /// Dispatch the pending batch, then evaluate rollover.
    pub async fn flush(&mut self) -> Result<(), DaemonError> {
        self.dispatch_batch().await?;
        self.check_rollover().await
    }

    /// Reap workers, bring back a dead writer, roll the log file name and
    /// deliver a pending cutoff.
    pub async fn housekeeping(&mut self) -> Result<(), DaemonError> {
        if let Output::Streaming(streaming) = &mut self.output {
            for result in streaming.supervisor.reap() {
                match result {
                    Ok(sent) => trace!(sent, "batch worker done"),
                    Err(DispatchError::Channel(e)) => return Err(DaemonError::ChannelLost(e)),
                    Err(e) => warn!(error = %e, "batch worker failed"),
                }
            }
            match streaming.supervisor.reap_writer() {
                Some(Ok(handled)) => warn!(handled, "writer exited unexpectedly"),
                Some(Err(e)) => warn!(error = %e, "writer died"),
                None => {}
            }
            if !streaming.supervisor.writer_alive() {
                streaming.respawn_writer(&self.stats);
            }
        }
        self.check_rollover().await?;
        self.send_pending_cutoff()
    }

    /// Flush and stop workers.
    pub async fn shutdown(mut self) -> Result<(), DaemonError> {
        self.dispatch_batch().await?;

        match &mut self.output {
            Output::Inline(writer) => {
                let closed = writer.close_all();
                debug!(closed, "closed log files");
            }
            Output::Streaming(streaming) => {
                let mut lost = None;
                for result in streaming.supervisor.join_batches() {
                    match result {
                        Ok(_) => {}
                        Err(DispatchError::Channel(e)) => lost = Some(e),
                        Err(e) => warn!(error = %e, "batch worker failed"),
                    }
                }
                if let Err(e) = streaming.channel.lock().shutdown(Shutdown::Write) {
                    warn!(error = %e, "cannot close writer channel");
                }
                match streaming.supervisor.join_writer() {
                    Some(Ok(handled)) => debug!(handled, "writer stopped"),
                    Some(Err(e)) => warn!(error = %e, "writer failed during shutdown"),
                    None => {}
                }
                if let Some(e) = lost {
                    return Err(DaemonError::ChannelLost(e));
                }
            }
        }
        info!("Controller stopped");
        Ok(())
    }

    fn accepting(&mut self) -> bool {
        let live = match &self.output {
            Output::Streaming(streaming) => streaming.supervisor.live_batches(),
            Output::Inline(_) => 0,
        };
        let over = live > self.max_live_workers;
        if over != self.backpressure {
            if over {
                warn!(live, max = self.max_live_workers, "too many live workers, pausing receive");
            } else {
                info!(live, "resuming receive");
            }
            self.backpressure = over;
        }
        !over
    }

    async fn check_rollover(&mut self) -> Result<(), DaemonError> {
        let now = self.clock.epoch_secs();
        if !self.rollover.is_due(now) {
            return Ok(());
        }
        // Lines queued under the old name go out first.
        self.dispatch_batch().await?;

        if let Some(rolled) = self.rollover.advance(now) {
            info!(log_file = %rolled.name, previous = ?rolled.previous, "log file name");
            if rolled.previous.is_some() {
                self.pending_cutoff = Some(rolled.cutoff);
            }
        }
        self.send_pending_cutoff()
    }

    /// Deliver the rollover cutoff once no batch worker can still be
    /// writing under the old name.
    fn send_pending_cutoff(&mut self) -> Result<(), DaemonError> {
        let Some(cutoff) = self.pending_cutoff else {
            return Ok(());
        };
        let msg = Message::Close { cutoff };
        match &mut self.output {
            Output::Inline(writer) => writer.handle(&msg)?,
            Output::Streaming(streaming) => {
                let sup = &streaming.supervisor;
                if sup.live_batches() > 0 || !sup.writer_alive() {
                    debug!(
                        live = sup.live_batches(),
                        "deferring descriptor cutoff until workers finish"
                    );
                    return Ok(());
                }
                ChannelSink::new(Arc::clone(&streaming.channel)).send(&[msg])?;
            }
        }
        self.pending_cutoff = None;
        Ok(())
    }

    async fn dispatch_batch(&mut self) -> Result<(), DaemonError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let entries = Arc::new(self.batch.take());
        Stats::incr(&self.stats.batches);
        let ctx = DispatchContext {
            layout: Arc::clone(&self.layout),
            log_file: self.rollover.name().unwrap_or_default().to_string(),
            stats: Arc::clone(&self.stats),
        };
        debug!(entries = entries.len(), "flushing batch");

        match &mut self.output {
            Output::Inline(writer) => {
                process_batch(&entries, &ctx, &mut InlineSink::new(writer))?;
            }
            Output::Streaming(streaming) => {
                let mut sink = ChannelSink::new(Arc::clone(&streaming.channel));
                let job: Job = {
                    let entries = Arc::clone(&entries);
                    let ctx = ctx.clone();
                    let mut sink = sink.clone();
                    Box::new(move || {
                        process_batch(&entries, &ctx, &mut sink).map(|sent| sent as u64)
                    })
                };
                if let Err((e, delay)) = streaming.supervisor.spawn_batch(job) {
                    Stats::incr(&self.stats.spawn_fallbacks);
                    warn!(error = %e, ?delay, "cannot spawn batch worker, writing inline");
                    tokio::time::sleep(delay).await;
                    process_batch(&entries, &ctx, &mut sink)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
