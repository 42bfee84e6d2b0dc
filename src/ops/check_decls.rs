//! The `check-decls` operation: decode each component's declaration
//! without running a simulation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decl::{ComponentDeclaration, RecordType, TrustStore};
use crate::ops::loader::ComponentLoader;
use crate::ops::simulate::store_records;
use crate::ops::SimulationError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CheckDeclsParams {
    pub snaps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeclarationStatus {
    pub snap_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckDeclsReport {
    pub declarations: Vec<DeclarationStatus>,
}

impl CheckDeclsReport {
    pub fn render_human(&self) -> String {
        self.declarations
            .iter()
            .map(|status| {
                format!(
                    "{}: {}\n",
                    status.snap_name,
                    status.error.as_deref().unwrap_or("OK")
                )
            })
            .collect()
    }
}

/// Decode the declaration of every listed component.
///
/// A declaration that fails to decode is reported, not fatal. Components that
/// cannot be loaded, or that conflict in the trust store, end the run.
pub fn check_decls<L: ComponentLoader + ?Sized>(
    params: &CheckDeclsParams,
    loader: &L,
) -> Result<CheckDeclsReport, SimulationError> {
    let mut store = TrustStore::new();
    let mut report = CheckDeclsReport::default();

    for id in &params.snaps {
        let source = loader.load(id)?;
        store_records(&mut store, &source)?;

        let name = source.reference.snap_name.clone();
        let error = store
            .find(RecordType::SnapDeclaration, &name)
            .found()
            .map(ComponentDeclaration::from_record)
            .and_then(Result::err)
            .map(|e| e.to_string());
        debug!("checked declaration of {}", name);

        report.declarations.push(DeclarationStatus {
            snap_name: name,
            error,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::loader::{ComponentRef, ComponentSource, InMemoryLoader, LoadError};
    use serde_json::json;

    fn source(name: &str) -> ComponentSource {
        ComponentSource::new(
            ComponentRef {
                snap_name: name.into(),
                snap_id: format!("{}-id", name),
                publisher_id: "acme".into(),
            },
            format!("name: {}\n", name),
        )
    }

    #[test]
    fn test_check_decls() {
        let loader = InMemoryLoader::new()
            .with("good", source("good").with_plug_rules(json!({"network": true})))
            .with(
                "bad",
                source("bad").with_slot_rules(json!({"network": {"allow-connection": 3}})),
            );
        let params = CheckDeclsParams {
            snaps: vec!["good".into(), "bad".into()],
        };
        let report = check_decls(&params, &loader).unwrap();

        assert_eq!(report.declarations.len(), 2);
        assert_eq!(report.declarations[0].error, None);
        assert!(report.declarations[1]
            .error
            .as_deref()
            .unwrap()
            .starts_with("malformed declaration"));

        let human = report.render_human();
        assert!(human.starts_with("good: OK\nbad: malformed declaration"));

        let value = serde_json::to_value(&report).unwrap();
        assert!(value["declarations"][0].get("error").is_none());
        assert_eq!(value["declarations"][1]["snap-name"], "bad");
    }

    #[test]
    fn test_check_decls_missing_component() {
        let params = CheckDeclsParams {
            snaps: vec!["ghost".into()],
        };
        let err = check_decls(&params, &InMemoryLoader::new()).unwrap_err();
        assert!(matches!(err, SimulationError::Load(LoadError::NotFound(_))));
    }
}
