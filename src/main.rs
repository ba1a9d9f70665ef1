//! DIP分组命令行工具

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use dip_grouper::batch::run_batch;
use dip_grouper::finance::DetailRow;
use dip_grouper::normalize::display_or_none;
use dip_grouper::options::{options_for, render_options};
use dip_grouper::{
    calculate_dip_metrics, Catalog, CatalogSet, CatalogStore, CodeName, DiagnosisSelection, DipGrouper,
    DipMetrics, PointCategory, ProcedureSelection, QueryOrder, ResolutionRequest, ResolutionResult, Result,
    Settings,
};

/// DIP分组命令行参数
#[derive(Parser, Debug)]
#[command(name = "dip_grouper")]
#[command(about = "DIP病种分组及费用测算工具")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// 替换默认的DIP目录 (CSV或JSON)
    #[arg(long, global = true)]
    dip_catalog: Option<PathBuf>,

    /// 替换默认的手术操作分类目录
    #[arg(long, global = true)]
    surgery_catalog: Option<PathBuf>,

    /// 替换默认的诊断编码及名称目录
    #[arg(long, global = true)]
    diagnosis_catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 单病例分组并测算费用
    Group(GroupArgs),
    /// 批量分组
    Batch {
        /// 病例CSV
        input: PathBuf,
        /// 结果CSV
        output: PathBuf,
    },
    /// 列出下拉选项
    Options(OptionsArgs),
    /// 列出当前生效的目录
    Catalogs,
}

#[derive(ClapArgs, Debug)]
struct GroupArgs {
    /// 手动输入诊断名称或编码
    #[arg(long, conflicts_with_all = ["diagnosis_code", "diagnosis_name"])]
    diagnosis: Option<String>,

    /// 从目录选择的诊断编码
    #[arg(long)]
    diagnosis_code: Option<String>,

    /// 从目录选择的诊断名称
    #[arg(long)]
    diagnosis_name: Option<String>,

    /// 手动输入操作编码或名称
    #[arg(long, conflicts_with_all = ["procedure_code", "procedure_name", "no_procedure"])]
    procedure: Option<String>,

    /// 从目录选择的操作编码
    #[arg(long, conflicts_with = "no_procedure")]
    procedure_code: Option<String>,

    /// 从目录选择的操作名称
    #[arg(long, conflicts_with = "no_procedure")]
    procedure_name: Option<String>,

    /// 无操作
    #[arg(long)]
    no_procedure: bool,

    /// 查询顺序
    #[arg(long, default_value = "diagnosis-first")]
    order: QueryOrder,

    /// 诊疗费用
    #[arg(long, default_value_t = 3936.93)]
    treatment_fee: f64,

    /// 检查检验费用
    #[arg(long, default_value_t = 3348.15)]
    examination_fee: f64,

    /// 药品费用
    #[arg(long, default_value_t = 2001.41)]
    drug_fee: f64,

    /// 耗材费用
    #[arg(long, default_value_t = 3115.78)]
    consumables_fee: f64,

    /// 统筹基金支付金额
    #[arg(long, default_value_t = 7657.03)]
    fund_paid: f64,

    /// 医疗性收入成本率, 默认取配置
    #[arg(long)]
    medical_cost_ratio: Option<f64>,

    /// 药耗成本率, 默认取配置
    #[arg(long)]
    drug_cost_ratio: Option<f64>,

    /// 点值类别 (resident/employee)
    #[arg(long)]
    point_category: Option<PointCategory>,

    /// 点值, 指定后忽略点值类别
    #[arg(long)]
    point_value: Option<f64>,

    /// 级别系数
    #[arg(long)]
    tier_coefficient: Option<f64>,

    /// 以JSON输出
    #[arg(long)]
    json: bool,
}

#[derive(ClapArgs, Debug)]
struct OptionsArgs {
    #[arg(long, default_value = "diagnosis-first")]
    order: QueryOrder,

    /// 已选择的诊断编码
    #[arg(long)]
    diagnosis_code: Option<String>,

    /// 已选择的操作编码
    #[arg(long, conflicts_with = "no_procedure")]
    procedure_code: Option<String>,

    /// 已选择"无操作的"
    #[arg(long)]
    no_procedure: bool,
}

impl GroupArgs {
    fn diagnosis_selection(&self) -> DiagnosisSelection {
        if self.diagnosis_code.is_some() || self.diagnosis_name.is_some() {
            return DiagnosisSelection::Catalog(CodeName::new(
                self.diagnosis_code.clone().unwrap_or_default(),
                self.diagnosis_name.clone().unwrap_or_default(),
            ));
        }
        match &self.diagnosis {
            Some(text) => DiagnosisSelection::FreeText(text.clone()),
            None => DiagnosisSelection::None,
        }
    }

    fn procedure_selection(&self) -> ProcedureSelection {
        if self.no_procedure {
            return ProcedureSelection::ExplicitNone;
        }
        if self.procedure_code.is_some() || self.procedure_name.is_some() {
            return ProcedureSelection::Catalog(CodeName::new(
                self.procedure_code.clone().unwrap_or_default(),
                self.procedure_name.clone().unwrap_or_default(),
            ));
        }
        match &self.procedure {
            Some(text) => ProcedureSelection::FreeText(text.clone()),
            None => ProcedureSelection::None,
        }
    }
}

/// `--json` 的输出
#[derive(Serialize)]
struct GroupReport<'a> {
    result: &'a ResolutionResult,
    metrics: &'a DipMetrics,
    details: Vec<DetailRow>,
}

// 导入命令行指定的目录, 失败时提示并继续使用默认目录
fn apply_uploads(store: &CatalogStore, args: &Args) {
    fn report(name: &str, path: &Path, outcome: Result<usize>) {
        match outcome {
            Ok(n) => println!("成功导入{}！共 {} 条记录", name, n),
            Err(e) => {
                warn!("{}导入失败: {}", name, e);
                eprintln!("{} 导入失败, 继续使用默认数据: {}", path.display(), e);
            }
        }
    }
    if let Some(path) = &args.dip_catalog {
        report("DIP目录", path, store.upload_dip(path));
    }
    if let Some(path) = &args.surgery_catalog {
        report("手术操作分类目录", path, store.upload_surgery(path));
    }
    if let Some(path) = &args.diagnosis_catalog {
        report("诊断编码及名称目录", path, store.upload_diagnosis(path));
    }
}

fn run_group(args: &GroupArgs, settings: &Settings, catalogs: &CatalogSet) -> Result<()> {
    let grouper = DipGrouper::new(settings.fallback_base_score);
    let request = ResolutionRequest::new(args.diagnosis_selection(), args.procedure_selection())
        .with_order(args.order);
    let result = grouper.resolve(catalogs, &request);

    let category = args.point_category.unwrap_or(settings.point_category);
    let mut inputs = settings.cost_inputs(result.base_score);
    inputs.treatment_fee = args.treatment_fee;
    inputs.examination_fee = args.examination_fee;
    inputs.drug_fee = args.drug_fee;
    inputs.consumables_fee = args.consumables_fee;
    inputs.fund_paid = args.fund_paid;
    inputs.point_value = args.point_value.unwrap_or_else(|| settings.point_value.get(category));
    if let Some(ratio) = args.medical_cost_ratio {
        inputs.medical_cost_ratio = ratio;
    }
    if let Some(ratio) = args.drug_cost_ratio {
        inputs.drug_cost_ratio = ratio;
    }
    if let Some(coefficient) = args.tier_coefficient {
        inputs.tier_coefficient = coefficient;
    }
    let metrics = calculate_dip_metrics(&inputs);

    if args.json {
        let report = GroupReport {
            result: &result,
            metrics: &metrics,
            details: metrics.detail_rows(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("查询顺序: {}", result.order);
    println!("诊断查询路径: {}", result.diagnosis_trace);
    println!("操作查询路径: {}", result.procedure_trace);
    println!();
    println!("诊断编码: {}", ResolutionResult::display(&result.diagnosis_code));
    println!("诊断名称: {}", ResolutionResult::display(&result.diagnosis_name));
    println!("操作编码: {}", ResolutionResult::display(&result.procedure_code));
    println!("操作名称: {}", ResolutionResult::display(&result.procedure_name));
    println!("DIP编码: {}", ResolutionResult::display(&result.group_code));
    println!("DIP名称: {}", result.group_name);
    println!("病种类型: {}", result.disease_type);
    if result.matched {
        println!("入组的DIP基准分值: {:.4}", result.base_score);
    } else {
        println!("入组的DIP基准分值: {:.4} (无法入组, 使用默认基准分值)", grouper.fallback_base_score());
    }
    println!();
    println!("点值类别: {}, 点值: {:.4}, 级别系数: {:.4}", category, inputs.point_value, inputs.tier_coefficient);
    println!("详细计算数据:");
    for row in metrics.detail_rows() {
        println!("  {:<12} {}", row.label, row.display);
    }
    Ok(())
}

fn run_options(args: &OptionsArgs, catalogs: &CatalogSet) {
    let procedure = if args.no_procedure {
        ProcedureSelection::ExplicitNone
    } else {
        match &args.procedure_code {
            Some(code) => ProcedureSelection::Catalog(CodeName::new(code.clone(), "")),
            None => ProcedureSelection::None,
        }
    };
    let options = options_for(&catalogs.dip, args.order, args.diagnosis_code.as_deref(), &procedure);
    match args.order {
        QueryOrder::DiagnosisFirst => {
            print!("{}", render_options("选择诊断", &options.diagnoses));
            print!("{}", render_options("选择操作", &options.procedures));
        }
        QueryOrder::ProcedureFirst => {
            print!("{}", render_options("选择操作", &options.procedures));
            print!("{}", render_options("选择诊断", &options.diagnoses));
        }
    }
}

fn print_catalogs(catalogs: &CatalogSet) {
    println!("DIP病种及分值目录 ({}, {} 条)", catalogs.dip.source, catalogs.dip.len());
    println!("序号,DIP编码,DIP名称,病种类型,诊断编码,诊断名称,操作编码,操作名称,病例数,入组的DIP基准分值");
    for r in catalogs.dip.records() {
        println!(
            "{},{},{},{},{},{},{},{},{},{:.4}",
            r.sequence_no,
            display_or_none(r.group_code.as_deref()),
            display_or_none(r.group_name.as_deref()),
            r.disease_type_label(),
            display_or_none(r.diagnosis_code.as_deref()),
            display_or_none(r.diagnosis_name.as_deref()),
            display_or_none(r.procedure_code.as_deref()),
            display_or_none(r.procedure_name.as_deref()),
            r.case_count,
            r.base_score
        );
    }
    println!();
    println!("手术操作分类目录 ({}, {} 条)", catalogs.surgery.source, catalogs.surgery.len());
    println!("操作编码,操作名称,操作类别");
    for e in catalogs.surgery.entries() {
        println!(
            "{},{},{}",
            display_or_none(e.code.as_deref()),
            display_or_none(e.name.as_deref()),
            e.category.as_ref().map(|c| c.label()).unwrap_or("无")
        );
    }
    println!();
    println!("诊断编码及名称目录 ({}, {} 条)", catalogs.diagnosis.source, catalogs.diagnosis.len());
    println!("诊断编码,诊断名称");
    for e in catalogs.diagnosis.entries() {
        println!(
            "{},{}",
            display_or_none(e.code.as_deref()),
            display_or_none(e.name.as_deref())
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(args.config.as_deref())?;
    let store = CatalogStore::with_bundled()?;
    apply_uploads(&store, &args);
    let catalogs = store.snapshot();
    info!("目录已就绪, 第 {} 代", catalogs.generation);

    match &args.command {
        Command::Group(group) => run_group(group, &settings, &catalogs)?,
        Command::Batch { input, output } => {
            let grouper = DipGrouper::new(settings.fallback_base_score);
            let summary = run_batch(&grouper, &catalogs, &settings, input, output)?;
            println!(
                "批量分组完成, 入组 {}/{}, 结果保存在 {}",
                summary.matched,
                summary.total,
                output.display()
            );
        }
        Command::Options(opts) => run_options(opts, &catalogs),
        Command::Catalogs => print_catalogs(&catalogs),
    }
    Ok(())
}
