use anyhow::{Context, Result};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use panel_guardian::authz::{Gate, Principal};
use panel_guardian::catalog::{ConfigRegistry, EntityCatalog};
use panel_guardian::policy::PolicyGenerator;
use panel_guardian::store::GuardScope;
use panel_guardian::{GuardianConfig, GuardianError, KeyCodec};
use uuid::Uuid;

const CONFIG: &str = r#"
[permission_key]
separator = "_"
case = "snake"

[policies]
merge = false
methods = ["viewAny", "view", "update"]

[resources.manage."App\\Filament\\Resources\\InvoiceResource"]
methods = ["viewAny", "export"]

[[panels]]
id = "admin"

[[panels.resources]]
class = "App\\Filament\\Resources\\InvoiceResource"
model = "App\\Models\\Invoice"

[[panels.resources]]
class = "App\\Filament\\Resources\\OrderLineResource"
model = "App\\Models\\OrderLine"
"#;

#[test]
fn loads_config_and_writes_policies() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let config_path = dir.path().join("guardian.toml");
    std::fs::write(&config_path, CONFIG)?;

    let mut config = GuardianConfig::load(&config_path)?;
    config.policies.path = dir.path().join("policies");

    let codec = KeyCodec::from_config(&config.permission_key)?.shared();
    let catalog = EntityCatalog::build(&ConfigRegistry::new(&config), "admin", &config, codec.as_ref())?;
    let subjects: Vec<&String> = catalog.resource_subjects().keys().collect();
    assert_eq!(subjects, vec!["invoice", "order_line"]);

    let generator = PolicyGenerator::new(&config, codec);
    let policies = generator.generate(&catalog);
    assert_eq!(policies[0].permission_for("export"), Some("export_invoice"));
    assert_eq!(policies[0].permission_for("update"), None);
    assert_eq!(policies[1].permission_for("update"), Some("update_order_line"));

    let report = generator.write(&policies, false)?;
    assert_eq!(report.written.len(), 2);
    let raw = std::fs::read_to_string(dir.path().join("policies").join("InvoicePolicy.json"))?;
    let doc: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(doc["model"], "Invoice");
    assert_eq!(doc["methods"][0]["permission"], "view_any_invoice");

    // the gate consults the generated mapping
    let gate = Gate::new(config.super_admin_for(Some("admin")));
    let principal = Principal::new(Uuid::new_v4(), GuardScope::new("web"))
        .with_permissions(vec!["export_invoice".to_string()]);
    assert!(gate.allows_policy(&principal, &policies[0], "export"));
    assert!(!gate.allows_policy(&principal, &policies[0], "viewAny"));
    Ok(())
}

#[test]
fn broken_config_reports_the_path() -> Result<()> {
    let dir = tempdir().context("failed to create tempdir")?;
    let config_path = dir.path().join("guardian.toml");
    std::fs::write(&config_path, "[[panels]]\nguard = 3\n")?;

    match GuardianConfig::load(&config_path) {
        Err(GuardianError::ConfigParse { path, .. }) => assert_eq!(path, config_path),
        other => panic!("expected parse error, got {:?}", other.map(|c| c.panels.len())),
    }

    let missing = GuardianConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(missing, Err(GuardianError::ConfigRead { .. })));
    Ok(())
}

#[test]
fn unknown_key_case_is_a_configuration_error() {
    let mut config = GuardianConfig::default();
    config.permission_key.case = "title".to_string();
    assert!(matches!(
        KeyCodec::from_config(&config.permission_key),
        Err(GuardianError::Configuration(_))
    ));
}
