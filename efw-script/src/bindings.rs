//! Host functions and types every interpreter instance gets.

use crate::config::{BridgeConfig, Strategy};
use rhai::{Dynamic, Engine, EvalAltResult};
use serde_json::Value as JsonValue;

/// Script-side handle describing the interpreter instance, bound as
/// `_engine`.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    instance: u64,
    strategy: Strategy,
    entry_point: String,
}

impl EngineHandle {
    pub(crate) fn new(instance: u64, config: &BridgeConfig) -> Self {
        Self {
            instance,
            strategy: config.strategy,
            entry_point: config.entry_point.clone(),
        }
    }

    /// Process-unique id of the instance.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    fn get_instance(&mut self) -> i64 {
        self.instance as i64
    }

    fn get_strategy(&mut self) -> String {
        match self.strategy {
            Strategy::Shared => "shared".to_string(),
            Strategy::PerThread => "per_thread".to_string(),
        }
    }

    fn get_entry_point(&mut self) -> String {
        self.entry_point.clone()
    }
}

/// Register the efw host API on `engine`.
///
/// Script functions cannot see the global scope, so the folder and debug
/// globals are also exposed as functions.
pub(crate) fn register_host_api(engine: &mut Engine, config: &BridgeConfig) {
    let server_folder = config.server_root.display().to_string();
    let event_folder = config.event_root.display().to_string();
    let debug = config.debug;
    engine
        .register_fn("server_folder", move || server_folder.clone())
        .register_fn("event_folder", move || event_folder.clone())
        .register_fn("is_debug", move || debug);

    engine
        .register_type_with_name::<EngineHandle>("Engine")
        .register_get("instance", EngineHandle::get_instance)
        .register_get("strategy", EngineHandle::get_strategy)
        .register_get("entry_point", EngineHandle::get_entry_point);

    engine.on_print(|text| {
        tracing::info!(target: "efw::script", "{}", text);
    });
    engine.on_debug(|text, source, pos| {
        tracing::debug!(target: "efw::script", source = source.unwrap_or("<script>"), %pos, "{}", text);
    });

    register_utility_functions(engine);
}

fn register_utility_functions(engine: &mut Engine) {
    engine.register_fn(
        "to_json",
        |data: Dynamic| -> Result<String, Box<EvalAltResult>> {
            let value: JsonValue = rhai::serde::from_dynamic(&data)?;
            serde_json::to_string(&value).map_err(|e| Box::new(EvalAltResult::from(e.to_string())))
        },
    );

    engine.register_fn(
        "from_json",
        |text: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            let value: JsonValue = serde_json::from_str(text)
                .map_err(|e| Box::new(EvalAltResult::from(e.to_string())))?;
            rhai::serde::to_dynamic(value)
        },
    );

    engine.register_fn("log_info", |msg: &str| {
        tracing::info!(target: "efw::script", "{}", msg);
    });

    engine.register_fn("log_warn", |msg: &str| {
        tracing::warn!(target: "efw::script", "{}", msg);
    });

    engine.register_fn("log_error", |msg: &str| {
        tracing::error!(target: "efw::script", "{}", msg);
    });
}
