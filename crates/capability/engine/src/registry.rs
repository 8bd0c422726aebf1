//! 设备型号注册表（静态注册，无运行时扫描）。

use crate::driver::DeviceDriver;
use crate::drivers::{lk, renke, swegon};
use crate::error::EngineError;
use std::collections::BTreeMap;

pub type DriverFactory = fn() -> Box<dyn DeviceDriver>;

/// 型号名（`厂商/型号`）→ 驱动构造函数。
#[derive(Default, Clone)]
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置驱动。
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(renke::MODEL_ID, renke::factory);
        registry.register(lk::MODEL_ID, lk::factory);
        registry.register(swegon::CASA_MODEL_ID, swegon::casa_factory);
        registry.register(swegon::CASA_R7_MODEL_ID, swegon::casa_r7_factory);
        registry
    }

    /// 注册型号；同名覆盖并返回 true。
    pub fn register(&mut self, model: impl Into<String>, factory: DriverFactory) -> bool {
        self.factories.insert(model.into(), factory).is_some()
    }

    pub fn create(&self, model: &str) -> Result<Box<dyn DeviceDriver>, EngineError> {
        self.factories
            .get(model)
            .map(|factory| factory())
            .ok_or_else(|| EngineError::UnknownModel(model.to_string()))
    }

    /// 已注册型号，按名称排序。
    pub fn models(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.factories.contains_key(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_models_are_registered() {
        let registry = DriverRegistry::with_builtin();
        assert_eq!(
            registry.models(),
            vec![
                "LKSystems/ARCHUB",
                "Renke/RS-WS-N01-8",
                "Swegon/CASA",
                "Swegon/CASA_R7"
            ]
        );
        let driver = registry.create("Swegon/CASA_R7").expect("create");
        assert_eq!(driver.info().model, "CASA R7");
    }

    #[test]
    fn unknown_model_is_an_error() {
        let registry = DriverRegistry::with_builtin();
        let err = registry.create("Acme/Nothing").err().expect("unknown");
        assert!(matches!(err, EngineError::UnknownModel(model) if model == "Acme/Nothing"));
    }

    #[test]
    fn register_overrides_existing_model() {
        let mut registry = DriverRegistry::new();
        assert!(!registry.register("Renke/RS-WS-N01-8", renke::factory));
        assert!(registry.register("Renke/RS-WS-N01-8", renke::factory));
        assert!(registry.contains("Renke/RS-WS-N01-8"));
    }
}
