//! Optional request log.
//!
//! When enabled with `--request-log` (or
//! [`GanderDefault::RequestLog`](../config/enum.GanderDefault.html#variant.RequestLog)),
//! a logger task is launched before the workers start, and every worker is handed the
//! sending half of a channel. Each completed request is sent as a [`GanderLog`], and the
//! logger task writes it to file through Tokio's asynchronous
//! [`BufWriter`](https://docs.rs/tokio/*/tokio/io/struct.BufWriter.html), keeping disk io
//! off the workers.
//!
//! The format is set with `--request-format`:
//!  - `json`: one JSON object per line
//!  - `csv`: a header row followed by one row per request
//!  - `raw`: the Rust `Debug` output of each entry
//!
//! A `json` entry looks like:
//! ```json
//! {"elapsed":1204,"worker":3,"iteration":17,"url":"http://localhost:8080/health","status":200,"duration":11.482,"success":true,"error":null}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::GanderError;

/// Supported request log formats.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GanderLogFormat {
    #[default]
    Json,
    Csv,
    Raw,
}

/// One request as seen by a virtual worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    /// Milliseconds since the workers were released.
    pub elapsed: u64,
    pub worker: usize,
    pub iteration: usize,
    pub url: String,
    /// Status code, 0 if no response was received.
    pub status: u16,
    /// Request duration in milliseconds.
    pub duration: f64,
    pub success: bool,
    /// Transport failure, if any.
    pub error: Option<String>,
}
impl RequestLog {
    fn csv_header() -> &'static str {
        "elapsed,worker,iteration,url,status,duration,success,error"
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.elapsed,
            self.worker,
            self.iteration,
            csv_escape(&self.url),
            self.status,
            self.duration,
            self.success,
            csv_escape(self.error.as_deref().unwrap_or(""))
        )
    }
}

// Quote a field if it contains a delimiter, doubling embedded quotes.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Messages accepted by the logger task.
#[derive(Debug, Deserialize, Serialize)]
pub enum GanderLog {
    Request(RequestLog),
}

/// Sending half of the logger channel, if the request log is enabled. `None` tells the
/// logger task to flush and exit.
pub type GanderLoggerTx = Option<flume::Sender<Option<GanderLog>>>;

/// Handle of the logger task, if the request log is enabled.
pub type GanderLoggerJoinHandle = Option<tokio::task::JoinHandle<Result<(), GanderError>>>;

fn format_entry(format: GanderLogFormat, message: &GanderLog) -> String {
    match (format, message) {
        (GanderLogFormat::Json, GanderLog::Request(request)) => json!(request).to_string(),
        (GanderLogFormat::Csv, GanderLog::Request(request)) => request.csv_row(),
        (GanderLogFormat::Raw, GanderLog::Request(request)) => format!("{:?}", request),
    }
}

/// Create the request log and launch the logger task.
///
/// Returns `(None, None)` if `path` is empty. The file is created before returning so a
/// bad path is reported before any worker starts.
pub(crate) async fn start_request_logger(
    path: &str,
    format: GanderLogFormat,
) -> Result<(GanderLoggerJoinHandle, GanderLoggerTx), GanderError> {
    if path.is_empty() {
        return Ok((None, None));
    }

    let file = File::create(path).await?;
    info!("writing requests to request_log: {}", path);
    let mut writer = BufWriter::with_capacity(64 * 1024, file);
    if format == GanderLogFormat::Csv {
        writer
            .write_all(format!("{}\n", RequestLog::csv_header()).as_bytes())
            .await?;
    }

    let (tx, rx) = flume::unbounded();
    let path = path.to_string();
    let handle = tokio::spawn(logger_main(path, format, writer, rx));
    Ok((Some(handle), Some(tx)))
}

/// Logger task, writes messages from workers until it receives `None` or every sender
/// is dropped.
async fn logger_main(
    path: String,
    format: GanderLogFormat,
    mut writer: BufWriter<File>,
    receiver: flume::Receiver<Option<GanderLog>>,
) -> Result<(), GanderError> {
    while let Ok(Some(message)) = receiver.recv_async().await {
        let formatted_log = format_entry(format, &message);
        if let Err(e) = writer.write_all(format!("{}\n", formatted_log).as_bytes()).await {
            warn!("failed to write to {}: {}", path, e);
        }
    }

    info!("flushing request_log: {}", path);
    writer.flush().await?;
    Ok(())
}

/// Tell the logger task to exit, and wait for it to flush.
pub(crate) async fn stop_request_logger(
    handle: GanderLoggerJoinHandle,
    tx: GanderLoggerTx,
) -> Result<(), GanderError> {
    if let Some(tx) = tx {
        // The receiver is only gone if the task already exited.
        let _ = tx.send_async(None).await;
    }
    if let Some(handle) = handle {
        handle.await??;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(url: &str, error: Option<&str>) -> RequestLog {
        RequestLog {
            elapsed: 5,
            worker: 1,
            iteration: 2,
            url: url.to_string(),
            status: if error.is_some() { 0 } else { 200 },
            duration: 12.5,
            success: error.is_none(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!("json".parse::<GanderLogFormat>().unwrap(), GanderLogFormat::Json);
        assert_eq!("CSV".parse::<GanderLogFormat>().unwrap(), GanderLogFormat::Csv);
        assert_eq!("raw".parse::<GanderLogFormat>().unwrap(), GanderLogFormat::Raw);
        assert!("pretty".parse::<GanderLogFormat>().is_err());
        assert_eq!(GanderLogFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn csv_rows() {
        assert_eq!(
            entry("http://localhost/a", None).csv_row(),
            "5,1,2,http://localhost/a,200,12.5,true,"
        );
        assert_eq!(
            entry("http://localhost/?a=1,2", Some("connection \"refused\"")).csv_row(),
            "5,1,2,\"http://localhost/?a=1,2\",0,12.5,false,\"connection \"\"refused\"\"\""
        );
    }

    #[tokio::test]
    async fn writes_json_lines() {
        let path = std::env::temp_dir().join(format!(
            "gander-request-log-{}.json",
            std::process::id()
        ));
        let path = path.to_string_lossy().to_string();

        let (handle, tx) = start_request_logger(&path, GanderLogFormat::Json)
            .await
            .unwrap();
        let sender = tx.clone().unwrap();
        for _ in 0..3 {
            sender
                .send(Some(GanderLog::Request(entry("http://localhost/", None))))
                .unwrap();
        }
        stop_request_logger(handle, tx).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: RequestLog = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, entry("http://localhost/", None));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn disabled_without_path() {
        let (handle, tx) = start_request_logger("", GanderLogFormat::Csv).await.unwrap();
        assert!(handle.is_none());
        assert!(tx.is_none());
    }
}
