//! DIP入组判断
//!
//! 诊断先单独解析出诊断编码, 然后按固定顺序尝试各个入组方式, 第一个有结论的方式生效:
//!
//! 1. 未输入操作: 直接无法入组
//! 2. 情况1: 诊断编码+操作编码(或操作名称)在DIP目录中直接命中
//! 3. 情况2: 综合病种按操作类别匹配DIP名称中的组别后缀, 失败即终止
//! 4. 情况3: 基层病种/核心病种且没有操作, 匹配无操作记录
//! 5. 其余情况: 不满足入组条件
//!
//! 除终止性失败外, 只要有诊断编码, 最后还会只按诊断编码再找一次。
//! 入组失败不是错误, 结果里 `matched == false`, 基准分值取配置的默认值。

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::catalog::CatalogSet;
use crate::lookup::{
    find_diagnosis_code, find_matching_diagnosis, find_matching_operation,
    find_operation_category, get_composite_record, get_diagnosis_type,
    get_procedure_less_record,
};
use crate::model::{CodeName, DiseaseType, DipGroupRecord};
use crate::normalize::{clean_text, truncate_diagnosis_code, NONE_MARKER};

/// 入组失败时的DIP名称和病种类型
pub const UNGROUPED: &str = "无法入组";

/// 默认的入组失败基准分值
pub const DEFAULT_FALLBACK_BASE_SCORE: f64 = 27.7173;

// 请求===========================================================================

/// 诊断的输入方式
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosisSelection {
    /// 从目录下拉中选择
    Catalog(CodeName),
    /// 手动输入诊断名称或编码
    FreeText(String),
    None,
}

/// 操作的输入方式
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureSelection {
    Catalog(CodeName),
    FreeText(String),
    /// 选择了"无操作的"
    ExplicitNone,
    None,
}

/// 查询顺序, 只影响下拉选项的构造
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum QueryOrder {
    #[default]
    DiagnosisFirst,
    ProcedureFirst,
}

impl QueryOrder {
    pub fn label(&self) -> &'static str {
        match self {
            QueryOrder::DiagnosisFirst => "先诊断后操作",
            QueryOrder::ProcedureFirst => "先操作后诊断",
        }
    }
}

impl fmt::Display for QueryOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QueryOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "diagnosis-first" | "先诊断后操作" => Ok(QueryOrder::DiagnosisFirst),
            "procedure-first" | "先操作后诊断" => Ok(QueryOrder::ProcedureFirst),
            other => Err(format!("未知的查询顺序: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRequest {
    pub diagnosis: DiagnosisSelection,
    pub procedure: ProcedureSelection,
    pub order: QueryOrder,
}

impl ResolutionRequest {
    pub fn new(diagnosis: DiagnosisSelection, procedure: ProcedureSelection) -> Self {
        Self {
            diagnosis,
            procedure,
            order: QueryOrder::default(),
        }
    }

    pub fn with_order(mut self, order: QueryOrder) -> Self {
        self.order = order;
        self
    }
}

// 结果===========================================================================

/// 生效的入组方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStrategy {
    /// 情况1
    Direct,
    /// 情况2
    CompositeCategory,
    /// 情况3
    ProcedureLess,
    /// 只按诊断编码兜底
    DiagnosisOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub matched: bool,
    pub strategy: Option<MatchStrategy>,
    pub record: Option<DipGroupRecord>,
    pub order: QueryOrder,
    pub diagnosis_code: Option<String>,
    pub diagnosis_name: Option<String>,
    pub procedure_code: Option<String>,
    pub procedure_name: Option<String>,
    pub group_code: Option<String>,
    pub group_name: String,
    pub disease_type: String,
    pub base_score: f64,
    /// 诊断是怎么解析出来的
    pub diagnosis_trace: String,
    /// 走了哪个入组分支
    pub procedure_trace: String,
}

impl ResolutionResult {
    /// 展示用, 没有值显示"无"
    pub fn display(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or(NONE_MARKER)
    }
}

// 诊断解析===========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDiagnosis {
    pub code: Option<String>,
    pub name: Option<String>,
    pub trace: String,
}

/// 诊断解析, 与操作无关
///
/// 目录选择直接使用目录的编码和名称; 手动输入先查编码再截断到小数点后一位。
pub fn resolve_diagnosis(catalogs: &CatalogSet, selection: &DiagnosisSelection) -> ResolvedDiagnosis {
    match selection {
        DiagnosisSelection::Catalog(pick) => ResolvedDiagnosis {
            code: pick.code.clone(),
            name: pick.name.clone(),
            trace: "正常选择诊断".to_string(),
        },
        DiagnosisSelection::FreeText(text) if !text.trim().is_empty() => {
            let input = text.trim();
            match find_diagnosis_code(&catalogs.diagnosis, input) {
                Some(raw) => {
                    let code = truncate_diagnosis_code(&raw);
                    ResolvedDiagnosis {
                        trace: format!("手动输入诊断: {} -> 编码: {} -> 截断后: {}", input, raw, code),
                        code: clean_text(&code),
                        name: Some(input.to_string()),
                    }
                }
                None => {
                    // 目录里查不到就把输入直接当作编码
                    let code = truncate_diagnosis_code(input);
                    ResolvedDiagnosis {
                        trace: format!("手动输入诊断: {} -> 直接作为编码处理 -> 截断后: {}", input, code),
                        code: clean_text(&code),
                        name: Some(input.to_string()),
                    }
                }
            }
        }
        _ => ResolvedDiagnosis {
            code: None,
            name: None,
            trace: "未选择诊断".to_string(),
        },
    }
}

// 入组方式===========================================================================

/// 交给各入组方式的操作
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureInput {
    /// 目录选择或手动输入的操作, `alternate` 为目录选择时附带的名称
    Identifier { primary: String, alternate: Option<String> },
    /// 手动输入了"无"
    Sentinel,
    /// 选择了"无操作的"
    ExplicitNone,
    /// 没有选择也没有输入
    Missing { trace: &'static str },
}

impl ProcedureInput {
    pub fn from_selection(selection: &ProcedureSelection) -> Self {
        match selection {
            ProcedureSelection::Catalog(pick) => match (&pick.code, &pick.name) {
                (Some(code), name) => ProcedureInput::Identifier {
                    primary: code.clone(),
                    alternate: name.clone(),
                },
                (None, Some(name)) => ProcedureInput::Identifier {
                    primary: name.clone(),
                    alternate: None,
                },
                (None, None) => ProcedureInput::Missing { trace: "未选择操作" },
            },
            ProcedureSelection::FreeText(text) => {
                let text = text.trim();
                if text.is_empty() {
                    ProcedureInput::Missing { trace: "未输入操作" }
                } else {
                    match clean_text(text) {
                        Some(t) => ProcedureInput::Identifier { primary: t, alternate: None },
                        None => ProcedureInput::Sentinel,
                    }
                }
            }
            ProcedureSelection::ExplicitNone => ProcedureInput::ExplicitNone,
            ProcedureSelection::None => ProcedureInput::Missing { trace: "未选择操作" },
        }
    }

    /// 用户给出的操作编码和名称, 手动输入时两者相同
    fn as_display(&self) -> (Option<String>, Option<String>) {
        match self {
            ProcedureInput::Identifier { primary, alternate: Some(name) } => {
                (Some(primary.clone()), Some(name.clone()))
            }
            ProcedureInput::Identifier { primary, alternate: None } => {
                (Some(primary.clone()), Some(primary.clone()))
            }
            _ => (None, None),
        }
    }
}

/// 入组方式的输入, 只读
#[derive(Debug)]
pub struct MatchContext<'a> {
    pub catalogs: &'a CatalogSet,
    pub diagnosis_code: &'a str,
    pub disease_type: Option<DiseaseType>,
    pub procedure: &'a ProcedureInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a> {
    pub strategy: MatchStrategy,
    pub record: &'a DipGroupRecord,
    pub trace: String,
}

/// 单个入组方式的结论
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<'a> {
    Matched(Match<'a>),
    /// 不适用, 交给下一个入组方式
    Pass,
    /// 无法入组, 仍可按诊断兜底
    Failed(String),
    /// 无法入组, 不再兜底
    Rejected(String),
}

pub type Strategy = for<'a> fn(&MatchContext<'a>) -> Verdict<'a>;

/// 按优先级排列的入组方式
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("未输入操作", missing_procedure),
    ("情况1", direct_match),
    ("情况2", composite_category_match),
    ("情况3", procedure_less_match),
    ("不满足入组条件", unmatched),
];

pub fn missing_procedure<'a>(ctx: &MatchContext<'a>) -> Verdict<'a> {
    match ctx.procedure {
        ProcedureInput::Missing { trace } => Verdict::Failed(trace.to_string()),
        _ => Verdict::Pass,
    }
}

/// 情况1: 在DIP目录库中直接匹配
pub fn direct_match<'a>(ctx: &MatchContext<'a>) -> Verdict<'a> {
    let ProcedureInput::Identifier { primary, alternate } = ctx.procedure else {
        return Verdict::Pass;
    };
    let dip = &ctx.catalogs.dip;
    let hit = find_matching_operation(dip, ctx.diagnosis_code, primary).or_else(|| {
        alternate
            .as_deref()
            .and_then(|name| find_matching_operation(dip, ctx.diagnosis_code, name))
    });
    match hit {
        Some(record) => Verdict::Matched(Match {
            strategy: MatchStrategy::Direct,
            record,
            trace: "情况1：在DIP目录库中直接匹配入组".to_string(),
        }),
        None => Verdict::Pass,
    }
}

/// 情况2: 综合病种按操作类别匹配, 失败即终止
pub fn composite_category_match<'a>(ctx: &MatchContext<'a>) -> Verdict<'a> {
    if ctx.disease_type != Some(DiseaseType::Composite) {
        return Verdict::Pass;
    }
    let (primary, alternate) = match ctx.procedure {
        ProcedureInput::Identifier { primary, alternate } => (primary.as_str(), alternate.as_deref()),
        ProcedureInput::Sentinel => {
            return Verdict::Rejected("无法入组：未找到操作类别".to_string());
        }
        ProcedureInput::ExplicitNone => {
            return Verdict::Rejected("无法入组：综合病种必须有操作".to_string());
        }
        ProcedureInput::Missing { .. } => return Verdict::Pass,
    };
    let surgery = &ctx.catalogs.surgery;
    let category = find_operation_category(surgery, primary)
        .or_else(|| alternate.and_then(|name| find_operation_category(surgery, name)));
    let Some(category) = category else {
        return Verdict::Rejected("无法入组：未找到操作类别".to_string());
    };
    match get_composite_record(&ctx.catalogs.dip, ctx.diagnosis_code, &category) {
        Some(record) => Verdict::Matched(Match {
            strategy: MatchStrategy::CompositeCategory,
            record,
            trace: format!("情况2：综合病种匹配，操作类别为{}", category),
        }),
        None => Verdict::Rejected("无法入组：未找到匹配的综合病种记录".to_string()),
    }
}

/// 情况3: 基层病种或核心病种, 无操作直接入组
pub fn procedure_less_match<'a>(ctx: &MatchContext<'a>) -> Verdict<'a> {
    let Some(disease_type) = ctx.disease_type.as_ref().filter(|t| t.allows_no_procedure()) else {
        return Verdict::Pass;
    };
    if !matches!(ctx.procedure, ProcedureInput::ExplicitNone | ProcedureInput::Sentinel) {
        return Verdict::Pass;
    }
    match get_procedure_less_record(&ctx.catalogs.dip, ctx.diagnosis_code) {
        Some(record) => Verdict::Matched(Match {
            strategy: MatchStrategy::ProcedureLess,
            record,
            trace: format!("情况3：{}，无操作直接入组", disease_type),
        }),
        None => Verdict::Failed(format!("无法入组：未找到{}的无操作记录", disease_type)),
    }
}

pub fn unmatched<'a>(ctx: &MatchContext<'a>) -> Verdict<'a> {
    match (ctx.procedure, &ctx.disease_type) {
        (ProcedureInput::ExplicitNone | ProcedureInput::Sentinel, None) => {
            Verdict::Failed("无法入组：未找到诊断的病种类型".to_string())
        }
        _ => Verdict::Failed("无法入组：不满足入组条件".to_string()),
    }
}

// 分组引擎===========================================================================

/// DIP分组器, 不持有目录, 每次分组传入一代目录快照
#[derive(Debug, Clone)]
pub struct DipGrouper {
    fallback_base_score: f64,
}

impl Default for DipGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_BASE_SCORE)
    }
}

impl DipGrouper {
    pub fn new(fallback_base_score: f64) -> Self {
        Self { fallback_base_score }
    }

    pub fn fallback_base_score(&self) -> f64 {
        self.fallback_base_score
    }

    pub fn resolve(&self, catalogs: &CatalogSet, request: &ResolutionRequest) -> ResolutionResult {
        let diagnosis = resolve_diagnosis(catalogs, &request.diagnosis);
        let procedure = ProcedureInput::from_selection(&request.procedure);
        let diagnosis_code = diagnosis.code.clone().unwrap_or_default();
        let diagnosis_code = diagnosis_code.as_str();
        let ctx = MatchContext {
            catalogs,
            diagnosis_code,
            disease_type: get_diagnosis_type(&catalogs.dip, diagnosis_code),
            procedure: &procedure,
        };
        debug!(
            "入组判断: 诊断 {:?}, 病种类型 {:?}, 操作 {:?}",
            diagnosis_code, ctx.disease_type, procedure
        );

        let mut verdict = Verdict::Pass;
        for (name, strategy) in STRATEGIES {
            verdict = strategy(&ctx);
            if verdict != Verdict::Pass {
                debug!("入组方式 {} 给出结论: {:?}", name, verdict);
                break;
            }
        }

        let mut diagnosis_trace = diagnosis.trace.clone();
        let (found, procedure_trace) = match verdict {
            Verdict::Matched(m) => {
                let trace = m.trace.clone();
                (Some(m), trace)
            }
            Verdict::Failed(trace) => {
                // 兜底: 只按诊断编码查找
                let fallback = find_matching_diagnosis(&catalogs.dip, diagnosis_code).map(|record| {
                    diagnosis_trace = format!("手动输入诊断匹配成功: {}", diagnosis_code);
                    Match {
                        strategy: MatchStrategy::DiagnosisOnly,
                        record,
                        trace: trace.clone(),
                    }
                });
                (fallback, trace)
            }
            Verdict::Rejected(trace) => (None, trace),
            // 最后一个入组方式总会给出结论
            Verdict::Pass => (None, "无法入组：不满足入组条件".to_string()),
        };

        match found {
            Some(m) => self.grouped(request.order, diagnosis, &procedure, m, diagnosis_trace, procedure_trace),
            None => self.ungrouped(request.order, diagnosis, &procedure, diagnosis_trace, procedure_trace),
        }
    }

    fn grouped(
        &self,
        order: QueryOrder,
        diagnosis: ResolvedDiagnosis,
        procedure: &ProcedureInput,
        m: Match<'_>,
        diagnosis_trace: String,
        procedure_trace: String,
    ) -> ResolutionResult {
        let record = m.record;
        let (input_code, _) = procedure.as_display();
        // 情况2/3沿用解析出的诊断名称, 其他情况取目录记录的诊断名称
        let diagnosis_name = match m.strategy {
            MatchStrategy::CompositeCategory | MatchStrategy::ProcedureLess => {
                diagnosis.name.clone().or_else(|| record.diagnosis_name.clone())
            }
            _ => record.diagnosis_name.clone().or_else(|| diagnosis.name.clone()),
        };
        let (procedure_code, procedure_name) = match m.strategy {
            MatchStrategy::Direct => (record.procedure_code.clone(), record.procedure_name.clone()),
            MatchStrategy::CompositeCategory => (input_code, record.procedure_name.clone()),
            MatchStrategy::ProcedureLess => (None, None),
            MatchStrategy::DiagnosisOnly => (
                input_code.or_else(|| record.procedure_code.clone()),
                record.procedure_name.clone(),
            ),
        };
        debug!("入组成功: {:?} -> {:?}", m.strategy, record.group_code);
        ResolutionResult {
            matched: true,
            strategy: Some(m.strategy),
            record: Some(record.clone()),
            order,
            diagnosis_code: diagnosis.code,
            diagnosis_name,
            procedure_code,
            procedure_name,
            group_code: record.group_code.clone(),
            group_name: record.group_name.clone().unwrap_or_else(|| NONE_MARKER.to_string()),
            disease_type: record.disease_type_label().to_string(),
            base_score: record.base_score,
            diagnosis_trace,
            procedure_trace,
        }
    }

    fn ungrouped(
        &self,
        order: QueryOrder,
        diagnosis: ResolvedDiagnosis,
        procedure: &ProcedureInput,
        diagnosis_trace: String,
        procedure_trace: String,
    ) -> ResolutionResult {
        let (procedure_code, procedure_name) = procedure.as_display();
        debug!("无法入组, 使用默认基准分值 {}", self.fallback_base_score);
        ResolutionResult {
            matched: false,
            strategy: None,
            record: None,
            order,
            diagnosis_code: diagnosis.code,
            diagnosis_name: diagnosis.name,
            procedure_code,
            procedure_name,
            group_code: None,
            group_name: UNGROUPED.to_string(),
            disease_type: UNGROUPED.to_string(),
            base_score: self.fallback_base_score,
            diagnosis_trace,
            procedure_trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, DiagnosisCatalog, DipCatalog, SurgeryCatalog};

    const DIP_CSV: &str = "\
序号,DIP编码,DIP名称,病种类型,诊断编码,诊断名称,操作编码,操作名称,病例数,入组的DIP基准分值
1,H25.0S002,老年性初期白内障-手术组02,基层病种,H25.0,老年性初期白内障,13.4100x001,白内障超声乳化抽吸术,7568,78.0521
2,H25.0N001,老年性初期白内障,基层病种,H25.0,老年性初期白内障,无,无,300,30.5
3,I21.9D001,急性心肌梗死-诊断组,综合病种,I21.9,急性心肌梗死,88.5500,冠状动脉造影,10,40.0
4,I21.9S001,急性心肌梗死-手术组,综合病种,I21.9,急性心肌梗死,36.0600,冠状动脉支架置入术,20,120.5
5,I21.9T001,急性心肌梗死-治疗组,综合病种,I21.9,急性心肌梗死,99.1000,溶栓治疗,30,60.25
6,J18.9C001,肺炎-支气管镜,核心病种,J18.9,肺炎,33.2201,支气管镜检查,80,35.0
";

    const SURGERY_CSV: &str = "\
操作编码,操作名称,操作类别
36.0601,冠状动脉药物洗脱支架置入术,介入治疗
99.1001,尿激酶溶栓治疗,治疗性操作
88.5501,左心室造影,诊断性操作
00.0001,其他操作,其他
";

    fn catalogs() -> CatalogSet {
        CatalogSet::new(
            DipCatalog::from_csv_str(DIP_CSV, "test").unwrap(),
            SurgeryCatalog::from_csv_str(SURGERY_CSV, "test").unwrap(),
            DiagnosisCatalog::bundled().unwrap(),
        )
    }

    fn resolve(d: DiagnosisSelection, p: ProcedureSelection) -> ResolutionResult {
        DipGrouper::default().resolve(&catalogs(), &ResolutionRequest::new(d, p))
    }

    fn text(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn catalog_picks_match_directly() {
        let r = resolve(
            DiagnosisSelection::Catalog(CodeName::new("H25.0", "老年性初期白内障")),
            ProcedureSelection::Catalog(CodeName::new("13.4100x001", "白内障超声乳化抽吸术")),
        );
        assert!(r.matched);
        assert_eq!(r.strategy, Some(MatchStrategy::Direct));
        assert_eq!(r.group_code.as_deref(), Some("H25.0S002"));
        assert_eq!(r.base_score, 78.0521);
        assert_eq!(r.diagnosis_trace, "正常选择诊断");
        assert_eq!(r.procedure_trace, "情况1：在DIP目录库中直接匹配入组");
    }

    #[test]
    fn free_text_diagnosis_is_truncated() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("H25.013")),
            ProcedureSelection::FreeText(text("白内障超声乳化抽吸术")),
        );
        assert!(r.matched);
        assert_eq!(r.diagnosis_code.as_deref(), Some("H25.0"));
        assert_eq!(r.procedure_code.as_deref(), Some("13.4100x001"));
        assert_eq!(r.diagnosis_trace, "手动输入诊断: H25.013 -> 编码: H25.013 -> 截断后: H25.0");
    }

    #[test]
    fn free_text_diagnosis_by_name() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("急性心肌梗死")),
            ProcedureSelection::FreeText(text("36.0600")),
        );
        // 诊断目录中的编码 I21.900 截断为 I21.9
        assert_eq!(r.diagnosis_code.as_deref(), Some("I21.9"));
        assert_eq!(r.group_code.as_deref(), Some("I21.9S001"));
        assert!(r.diagnosis_trace.contains("编码: I21.900"));
    }

    #[test]
    fn case1_takes_priority_over_case2() {
        // 综合病种同样先走情况1
        let r = resolve(
            DiagnosisSelection::FreeText(text("I21.9")),
            ProcedureSelection::FreeText(text("溶栓治疗")),
        );
        assert_eq!(r.strategy, Some(MatchStrategy::Direct));
        assert_eq!(r.group_code.as_deref(), Some("I21.9T001"));
    }

    #[test]
    fn composite_matches_by_category() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("I21.9")),
            ProcedureSelection::FreeText(text("36.0601")),
        );
        assert!(r.matched);
        assert_eq!(r.strategy, Some(MatchStrategy::CompositeCategory));
        assert!(r.group_name.contains("手术组"));
        assert_eq!(r.procedure_code.as_deref(), Some("36.0601"));
        // 操作名称取目录记录
        assert_eq!(r.procedure_name.as_deref(), Some("冠状动脉支架置入术"));
        assert_eq!(r.procedure_trace, "情况2：综合病种匹配，操作类别为介入治疗");

        let r = resolve(
            DiagnosisSelection::FreeText(text("I21.9")),
            ProcedureSelection::FreeText(text("左心室造影")),
        );
        assert!(r.group_name.contains("诊断组"));
    }

    #[test]
    fn composite_therapeutic_goes_to_treatment_group() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("I21.9")),
            ProcedureSelection::FreeText(text("99.1001")),
        );
        assert!(r.matched);
        assert_eq!(r.strategy, Some(MatchStrategy::CompositeCategory));
        assert_eq!(r.group_code.as_deref(), Some("I21.9T001"));
        assert!(r.group_name.contains("治疗组"));
        assert_eq!(r.procedure_code.as_deref(), Some("99.1001"));
        assert_eq!(r.procedure_name.as_deref(), Some("溶栓治疗"));
    }

    #[test]
    fn composite_failure_is_terminal() {
        // 类别查不到, 不会再只按诊断兜底
        let r = resolve(
            DiagnosisSelection::FreeText(text("I21.9")),
            ProcedureSelection::FreeText(text("12.3456")),
        );
        assert!(!r.matched);
        assert_eq!(r.procedure_trace, "无法入组：未找到操作类别");

        let r = resolve(
            DiagnosisSelection::FreeText(text("I21.9")),
            ProcedureSelection::FreeText(text("00.0001")),
        );
        assert!(!r.matched);
        assert_eq!(r.procedure_trace, "无法入组：未找到匹配的综合病种记录");
    }

    #[test]
    fn composite_with_explicit_none_always_fails() {
        let r = resolve(
            DiagnosisSelection::Catalog(CodeName::new("I21.9", "急性心肌梗死")),
            ProcedureSelection::ExplicitNone,
        );
        assert!(!r.matched);
        assert_eq!(r.procedure_trace, "无法入组：综合病种必须有操作");
        assert_eq!(r.group_name, UNGROUPED);
        assert_eq!(r.disease_type, UNGROUPED);
        assert_eq!(r.group_code, None);
        assert_eq!(r.base_score, DEFAULT_FALLBACK_BASE_SCORE);
    }

    #[test]
    fn procedure_less_for_baseline() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("老年性初期白内障")),
            ProcedureSelection::ExplicitNone,
        );
        assert!(r.matched);
        assert_eq!(r.strategy, Some(MatchStrategy::ProcedureLess));
        assert_eq!(r.group_code.as_deref(), Some("H25.0N001"));
        assert_eq!(r.procedure_code, None);
        assert_eq!(r.diagnosis_name.as_deref(), Some("老年性初期白内障"));
        assert_eq!(r.procedure_trace, "情况3：基层病种，无操作直接入组");

        // 手动输入"无"同样走情况3
        let r = resolve(
            DiagnosisSelection::FreeText(text("H25.0")),
            ProcedureSelection::FreeText(text("无")),
        );
        assert_eq!(r.strategy, Some(MatchStrategy::ProcedureLess));
    }

    #[test]
    fn missing_procedure_less_record_falls_back_to_diagnosis() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("J18.9")),
            ProcedureSelection::ExplicitNone,
        );
        assert!(r.matched);
        assert_eq!(r.strategy, Some(MatchStrategy::DiagnosisOnly));
        assert_eq!(r.procedure_trace, "无法入组：未找到核心病种的无操作记录");
        assert_eq!(r.diagnosis_trace, "手动输入诊断匹配成功: J18.9");
    }

    #[test]
    fn unmatched_procedure_falls_back_to_diagnosis() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("H25.0")),
            ProcedureSelection::FreeText(text("99.9999")),
        );
        assert!(r.matched);
        assert_eq!(r.strategy, Some(MatchStrategy::DiagnosisOnly));
        assert_eq!(r.procedure_code.as_deref(), Some("99.9999"));
        assert_eq!(r.group_code.as_deref(), Some("H25.0S002"));
    }

    #[test]
    fn no_procedure_entered() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("N17.9")),
            ProcedureSelection::FreeText(text("  ")),
        );
        assert!(!r.matched);
        assert_eq!(r.procedure_trace, "未输入操作");

        let r = resolve(DiagnosisSelection::FreeText(text("N17.9")), ProcedureSelection::None);
        assert_eq!(r.procedure_trace, "未选择操作");
        assert_eq!(r.diagnosis_code.as_deref(), Some("N17.9"));
    }

    #[test]
    fn unknown_diagnosis_fails() {
        let r = resolve(
            DiagnosisSelection::FreeText(text("不存在的诊断")),
            ProcedureSelection::FreeText(text("13.4100x001")),
        );
        assert!(!r.matched);
        assert_eq!(r.procedure_trace, "无法入组：不满足入组条件");
        assert!(r.diagnosis_trace.contains("直接作为编码处理"));
        assert_eq!(r.diagnosis_name.as_deref(), Some("不存在的诊断"));
        assert_eq!(r.procedure_code.as_deref(), Some("13.4100x001"));
    }

    #[test]
    fn no_diagnosis_never_groups() {
        let r = resolve(DiagnosisSelection::None, ProcedureSelection::ExplicitNone);
        assert!(!r.matched);
        assert_eq!(r.diagnosis_trace, "未选择诊断");
        assert_eq!(r.diagnosis_code, None);
        assert_eq!(ResolutionResult::display(&r.diagnosis_code), "无");
    }

    #[test]
    fn fallback_score_is_configurable() {
        let grouper = DipGrouper::new(10.0);
        assert_eq!(grouper.fallback_base_score(), 10.0);
        let r = grouper.resolve(
            &catalogs(),
            &ResolutionRequest::new(DiagnosisSelection::None, ProcedureSelection::None),
        );
        assert_eq!(r.base_score, 10.0);
    }

    #[test]
    fn query_order_parse() {
        assert_eq!("procedure-first".parse::<QueryOrder>(), Ok(QueryOrder::ProcedureFirst));
        assert_eq!("先诊断后操作".parse::<QueryOrder>(), Ok(QueryOrder::DiagnosisFirst));
        assert!("sideways".parse::<QueryOrder>().is_err());
    }
}
