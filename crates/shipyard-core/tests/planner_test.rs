use shipyard_cloud::{DatabaseSpec, ResourceKind};
use shipyard_core::{Format, InfrastructurePlanner, parse_str};

const SCENARIO_A: &str = r#"{
    "projectName": "shop",
    "databaseType": "local",
    "credentials": {
        "databasePassword": "db-pw-1",
        "appSecret": "app-secret-1"
    },
    "features": { "enableSSL": false }
}"#;

const FULL: &str = r#"
projectName: shop
region: ams3
instanceSize: s-2vcpu-4gb
domain: shop.example
databaseType: managed
adminEmail: ops@shop.example
sshPublicKeyPath: /home/ops/.ssh/id_ed25519.pub
credentials:
  appSecret: app-secret-1
  adminPassword: admin-pw-1
  extra:
    SMTP_PASSWORD: smtp-pw-1
features:
  enableSSL: true
  monitoring: true
  backups: true
  loadBalancer: true
"#;

#[test]
fn test_plan_is_deterministic() {
    let config = parse_str(FULL, Format::Yaml).unwrap();
    let planner = InfrastructurePlanner::new();

    let first = planner.plan(&config).unwrap();
    let second = planner.plan(&config).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_local_database_without_domain() {
    let config = parse_str(SCENARIO_A, Format::Json).unwrap();
    let plan = InfrastructurePlanner::new().plan(&config).unwrap();

    assert!(plan.domain.is_none());
    assert!(plan.certificate.is_none());
    assert!(matches!(plan.database, DatabaseSpec::Local(_)));
    assert_eq!(
        plan.resource_kinds(),
        vec![ResourceKind::Compute, ResourceKind::Firewall]
    );
    assert!(plan.bootstrap_script.contains("DATABASE_PASSWORD=db-pw-1"));
    assert!(plan.bootstrap_script.contains("APP_SECRET=app-secret-1"));
}

#[test]
fn test_full_plan_kinds_in_creation_order() {
    let config = parse_str(FULL, Format::Yaml).unwrap();
    let plan = InfrastructurePlanner::new().plan(&config).unwrap();

    assert_eq!(
        plan.resource_kinds(),
        vec![
            ResourceKind::SshKey,
            ResourceKind::Compute,
            ResourceKind::Database,
            ResourceKind::Firewall,
            ResourceKind::LoadBalancer,
            ResourceKind::Domain,
            ResourceKind::Certificate,
            ResourceKind::Monitoring,
        ]
    );
    assert_eq!(plan.region, "ams3");
    assert_eq!(plan.compute.size, "s-2vcpu-4gb");
    for secret in ["app-secret-1", "admin-pw-1", "smtp-pw-1"] {
        assert!(plan.bootstrap_script.contains(secret));
    }
}

#[test]
fn test_plan_contains_no_timestamps() {
    let config = parse_str(FULL, Format::Yaml).unwrap();
    let plan = InfrastructurePlanner::new().plan(&config).unwrap();
    let json = serde_json::to_value(&plan).unwrap();

    assert_eq!(json["compute"]["name"], "shop-app");
    assert_eq!(json["ssh_key"]["name"], "shop-deploy-key");
    assert!(!serde_json::to_string(&json).unwrap().contains("created_at"));
}
