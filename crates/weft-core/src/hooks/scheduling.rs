// SPDX-License-Identifier: Apache-2.0

//! Scheduler facet hook.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::{SchedulerConfig, SchedulingStrategy};
use crate::facet::{Facet, FacetError, STATE_MEMBER};
use crate::hook::{Hook, HookMeta};
use crate::kinds;
use crate::processor::Processor;
use crate::queue::MessageQueue;
use crate::scheduler::{Scheduler, SchedulerUpdate, SliceReport, SliceStatus};
use crate::stats::{StatsHandle, StatsRegistry};

use super::{optional_state, required_state, DEFAULT_SOURCE};

fn millis_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn report_json(report: &SliceReport) -> Value {
    json!({
        "status": match report.status {
            SliceStatus::Completed => "completed",
            SliceStatus::Paused => "paused",
        },
        "processed": report.processed,
        "errors": report.errors,
        "processingTimeMs": millis_u64(report.processing_time),
        "remainingTimeMs": report.remaining_time.map(millis_u64),
    })
}

fn parse_update(raw: &Value) -> Result<SchedulerUpdate, FacetError> {
    let mut update = SchedulerUpdate::default();
    if let Some(strategy) = raw.get("schedulingStrategy") {
        update.strategy = Some(match strategy.as_str() {
            Some("priority") => SchedulingStrategy::Priority,
            Some("fifo") => SchedulingStrategy::Fifo,
            _ => {
                return Err(FacetError::invalid(format!(
                    "unknown scheduling strategy: {strategy}"
                )))
            }
        });
    }
    if let Some(max) = raw.get("maxMessagesPerSlice") {
        let max = max
            .as_u64()
            .ok_or_else(|| FacetError::invalid("maxMessagesPerSlice must be a non-negative integer"))?;
        update.max_messages_per_slice = Some(usize::try_from(max).unwrap_or(usize::MAX));
    }
    if let Some(debug) = raw.get("debug") {
        update.debug = Some(
            debug
                .as_bool()
                .ok_or_else(|| FacetError::invalid("debug must be a boolean"))?,
        );
    }
    Ok(update)
}

/// Produces the scheduler facet, constructed over the queue and processor
/// components in `on_init` and configured from `config.scheduler`.
#[must_use]
pub fn scheduler_hook() -> Hook {
    let meta = HookMeta::new(kinds::SCHEDULER)
        .required([kinds::QUEUE, kinds::PROCESSOR])
        .attach(true)
        .source(DEFAULT_SOURCE);
    Hook::new(meta.clone(), move |args| {
        let config: SchedulerConfig = args
            .ctx
            .facet_config(kinds::SCHEDULER)
            .map_err(|err| FacetError::invalid(err.to_string()))?;

        let mut facet = Facet::from_meta(&meta)?;
        let _ = facet.on_init(move |facet, init| {
            let queue = required_state::<MessageQueue>(init.manager, kinds::QUEUE)?;
            let processor = required_state::<Processor>(init.manager, kinds::PROCESSOR)?;
            let stats = optional_state::<StatsRegistry>(init.manager, kinds::STATISTICS)
                .map(|s| s as StatsHandle);
            let scheduler = Arc::new(Scheduler::new(queue, processor, &config, stats));

            facet.add_handle(STATE_MEMBER, scheduler.clone())?;

            let process = scheduler.clone();
            facet.add_method("process", move |call| {
                let slice_ms = call
                    .args
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or_else(|| FacetError::invalid("'process' requires a slice in milliseconds"))?;
                Ok(report_json(&process.process(Duration::from_millis(slice_ms))))
            })?;

            let pause = scheduler.clone();
            facet.add_method("pauseProcessing", move |_call| {
                pause.pause_processing();
                Ok(Value::Null)
            })?;

            let resume = scheduler.clone();
            facet.add_method("resumeProcessing", move |_call| {
                resume.resume_processing();
                Ok(Value::Null)
            })?;

            let prioritize = scheduler.clone();
            facet.add_method("setPriority", move |call| {
                let priority = call
                    .args
                    .first()
                    .and_then(Value::as_i64)
                    .ok_or_else(|| FacetError::invalid("'setPriority' requires a number"))?;
                prioritize
                    .set_priority(priority)
                    .map_err(|err| FacetError::invalid(err.to_string()))?;
                Ok(Value::Null)
            })?;

            let configure = scheduler;
            facet.add_method("configureScheduler", move |call| {
                let raw = call
                    .args
                    .first()
                    .ok_or_else(|| FacetError::invalid("'configureScheduler' requires an options object"))?;
                configure.configure(parse_update(raw)?);
                Ok(Value::Null)
            })?;
            Ok(())
        })?;
        Ok(facet)
    })
}
