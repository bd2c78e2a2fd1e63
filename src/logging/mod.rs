use std::io::{self, Write};

use env_logger::Builder;
use log::LevelFilter;
use tokio::{
    fs::{create_dir_all, metadata, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        watch,
    },
};

use crate::{
    config,
    core::{DataError, DataResult},
};

pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let data = buf.to_vec();
        self.sender.send(data).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            config,
        }
    }

    fn create_async_writer(&self) -> AsyncWriter {
        AsyncWriter {
            sender: self.sender.clone(),
        }
    }

    /// Install the global logger. `RUST_LOG` still overrides the configured
    /// level. Without a `path`, lines go to stderr and `run` has nothing to do.
    pub fn init_env_logger(&self) {
        let mut builder = Builder::new();
        builder.filter(None, LevelFilter::from(&self.config.level));
        if let Ok(spec) = std::env::var("RUST_LOG") {
            builder.parse_filters(&spec);
        }
        if self.config.path.is_some() {
            builder.target(env_logger::Target::Pipe(Box::new(self.create_async_writer())));
        }
        let _ = builder.try_init();
    }

    /// Drain buffered log lines into the configured file until `shutdown`
    /// flips to true or every writer is gone.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> DataResult<()> {
        let Some(log_file_path) = self.config.path.clone() else {
            return Ok(());
        };
        // Only the writers installed in the logger keep the channel open.
        drop(self.sender);

        if let Some(parent) = std::path::Path::new(&log_file_path).parent() {
            if metadata(parent).await.is_err() {
                create_dir_all(parent).await.map_err(|e| {
                    DataError::Configuration(format!("Failed to create log path: {e}"))
                })?;
            }
        }

        let mut file = BufWriter::new(
            OpenOptions::new()
                .append(true)
                .create(true)
                .open(&log_file_path)
                .await
                .map_err(|e| {
                    DataError::Configuration(format!(
                        "Failed to open or create log file {log_file_path}: {e}"
                    ))
                })?,
        );

        loop {
            tokio::select! {
                biased;
                // Shutdown signal handling
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                },

                data = self.receiver.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = file.write_all(&data).await {
                                eprintln!("Failed to write to log file: {e}");
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // Lines logged before shutdown are still queued.
        while let Ok(data) = self.receiver.try_recv() {
            if let Err(e) = file.write_all(&data).await {
                eprintln!("Failed to write to log file: {e}");
            }
        }

        file.flush()
            .await
            .map_err(|e| DataError::Internal(format!("Failed to flush log file: {e}")))
    }
}
