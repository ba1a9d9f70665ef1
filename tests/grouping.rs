use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use dip_grouper::{
    calculate_dip_metrics, Catalog, CatalogStore, CodeName, DiagnosisSelection, DipCatalog, DipError,
    DipGrouper, MatchStrategy, ProcedureSelection, ResolutionRequest, Settings,
};

const DIP_CSV: &str = "\
序号,DIP编码,DIP名称,病种类型,诊断编码,诊断名称,操作编码,操作名称,病例数,入组的DIP基准分值
1,I21.9D001,急性心肌梗死-诊断组,综合病种,I21.9,急性心肌梗死,88.5500,冠状动脉造影,10,40.0
2,I21.9T001,急性心肌梗死-治疗组,综合病种,I21.9,急性心肌梗死,99.1000,溶栓治疗,30,60.25
3,I21.9S001,急性心肌梗死-手术组,综合病种,I21.9,急性心肌梗死,36.0600,冠状动脉支架置入术,20,120.5
4,I10.xN001,高血压,核心病种,I10.x,特发性(原发性)高血压,无,无,500,18.3
";

const SURGERY_CSV: &str = "\
操作编码,操作名称,操作类别
36.1001,冠状动脉搭桥术,手术
";

fn temp_file(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("dip_it_{}_{}", std::process::id(), name));
    fs::write(&path, content).unwrap();
    path
}

fn store_with_uploads(tag: &str) -> CatalogStore {
    let store = CatalogStore::with_bundled().unwrap();
    let dip = temp_file(&format!("{}_dip.csv", tag), DIP_CSV);
    let surgery = temp_file(&format!("{}_surgery.csv", tag), SURGERY_CSV);
    assert_eq!(store.upload_dip(&dip).unwrap(), 4);
    assert_eq!(store.upload_surgery(&surgery).unwrap(), 1);
    fs::remove_file(dip).ok();
    fs::remove_file(surgery).ok();
    store
}

#[test]
fn bundled_case_end_to_end() {
    let store = CatalogStore::with_bundled().unwrap();
    let settings = Settings::default();
    let result = DipGrouper::new(settings.fallback_base_score).resolve(
        &store.snapshot(),
        &ResolutionRequest::new(
            DiagnosisSelection::FreeText("H25.0".to_string()),
            ProcedureSelection::FreeText("13.4100x001".to_string()),
        ),
    );
    assert!(result.matched);
    assert_eq!(result.base_score, 78.0521);

    let metrics = calculate_dip_metrics(&settings.cost_inputs(result.base_score));
    assert!((metrics.total_cost - 12402.27).abs() < 1e-6);
    assert!((metrics.treatment_cost - 8759.73).abs() < 1e-6);
    assert!((metrics.patient_self_pay - 4745.24).abs() < 1e-6);
    assert!((metrics.payment_standard - 78.0521 * 1.0330 * 73.6011).abs() < 1e-9);
    assert_eq!(
        metrics.settlement_amount,
        (metrics.payment_standard - metrics.patient_self_pay).max(0.0)
    );
}

#[test]
fn composite_surgery_goes_to_surgery_group() {
    let store = store_with_uploads("composite");
    let result = DipGrouper::default().resolve(
        &store.snapshot(),
        &ResolutionRequest::new(
            DiagnosisSelection::FreeText("急性心肌梗死".to_string()),
            ProcedureSelection::FreeText("冠状动脉搭桥术".to_string()),
        ),
    );
    assert!(result.matched);
    assert_eq!(result.strategy, Some(MatchStrategy::CompositeCategory));
    assert!(result.group_name.contains("手术组"));
    assert!(!result.group_name.contains("治疗组"));
    assert_eq!(result.group_code.as_deref(), Some("I21.9S001"));
    assert_eq!(result.diagnosis_code.as_deref(), Some("I21.9"));
    assert_eq!(result.procedure_code.as_deref(), Some("冠状动脉搭桥术"));
    assert_eq!(result.procedure_name.as_deref(), Some("冠状动脉支架置入术"));
}

#[test]
fn procedure_less_and_composite_gating() {
    let store = store_with_uploads("core");
    let grouper = DipGrouper::default();
    let catalogs = store.snapshot();
    let result = grouper.resolve(
        &catalogs,
        &ResolutionRequest::new(
            DiagnosisSelection::Catalog(CodeName::new("I10.x", "特发性(原发性)高血压")),
            ProcedureSelection::ExplicitNone,
        ),
    );
    assert_eq!(result.strategy, Some(MatchStrategy::ProcedureLess));
    assert_eq!(result.group_code.as_deref(), Some("I10.xN001"));

    let result = grouper.resolve(
        &catalogs,
        &ResolutionRequest::new(
            DiagnosisSelection::Catalog(CodeName::new("I21.9", "急性心肌梗死")),
            ProcedureSelection::ExplicitNone,
        ),
    );
    assert!(!result.matched);
    assert_eq!(result.group_name, "无法入组");
}

#[test]
fn rejected_upload_keeps_previous_catalog() {
    let store = store_with_uploads("reject");
    let before = store.snapshot();

    let broken = DIP_CSV.replacen("操作编码,", "", 1);
    let path = temp_file("reject_broken.csv", &broken);
    let err = store.upload_dip(&path).unwrap_err();
    fs::remove_file(&path).ok();

    match err {
        DipError::CatalogSchema { missing, .. } => assert_eq!(missing, vec!["操作编码".to_string()]),
        other => panic!("unexpected error: {:?}", other),
    }
    let after = store.snapshot();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.dip.len(), 4);
}

#[test]
fn unreadable_upload_is_io_error() {
    let store = CatalogStore::with_bundled().unwrap();
    let err = store
        .upload_dip(std::env::temp_dir().join("dip_it_does_not_exist.csv"))
        .unwrap_err();
    assert!(matches!(err, DipError::CatalogIo(_)));
    assert_eq!(store.snapshot().generation, 0);
}

#[test]
fn withdraw_restores_bundled_catalog() {
    let store = store_with_uploads("withdraw");
    assert_eq!(store.snapshot().dip.len(), 4);
    store.withdraw_dip();
    store.withdraw_surgery();
    let catalogs = store.snapshot();
    assert_eq!(*catalogs.dip, DipCatalog::bundled().unwrap());
    assert_eq!(catalogs.generation, 4);
}
