pub use crate::client::{HttpResponse, ReqwestTransport, Transport, TransportError};
pub use crate::config::{GanderConfiguration, GanderDefault, GanderDefaultType, RunConfig};
pub use crate::metrics::{AggregateResult, MetricKind, Observation, RunResult};
pub use crate::report::{render, render_markdown, RenderedReport};
pub use crate::threshold::{Threshold, ThresholdOutcome};
pub use crate::{GanderAttack, GanderError};
