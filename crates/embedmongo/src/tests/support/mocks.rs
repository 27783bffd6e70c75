use std::path::Path;

use embedmongo_engine::{
    AdminSession, ArtifactRetrievalConfig, CommandResult, Distribution, Engine, EngineError,
    EngineVersion, ImportProcess, ImportSpec, Launchable, Net, RunConfiguration, RuntimeSettings,
};
use mockall::mock;
use serde_json::Value;

mock! {
    pub Engine {}

    impl Engine for Engine {
        fn resolve(
            &self,
            version: &EngineVersion,
            artifacts: &ArtifactRetrievalConfig,
        ) -> Result<Distribution, EngineError>;

        fn prepare(
            &self,
            distribution: &Distribution,
            run: &RunConfiguration,
            runtime: &RuntimeSettings,
        ) -> Result<Box<dyn Launchable>, EngineError>;

        fn import_bulk(
            &self,
            distribution: &Distribution,
            spec: &ImportSpec,
        ) -> Result<Box<dyn ImportProcess>, EngineError>;

        fn admin(
            &self,
            distribution: &Distribution,
            net: &Net,
            database: &str,
        ) -> Result<Box<dyn AdminSession>, EngineError>;
    }
}

mock! {
    pub Session {}

    impl AdminSession for Session {
        fn run_command(&self, command: &Value) -> Result<CommandResult, EngineError>;
    }
}

mock! {
    pub Import {}

    impl ImportProcess for Import {
        fn file(&self) -> &Path;
        fn wait(&mut self) -> Result<i32, EngineError>;
        fn kill(&mut self) -> Result<(), EngineError>;
    }
}
