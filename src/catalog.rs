//! 三张目录: DIP病种及分值目录、手术操作分类目录、诊断编码及名称目录
//!
//! 目录可以从CSV或JSON读取。读取时先检查必要列, 缺列整表拒收;
//! 通过检查后再逐行反序列化, 文本单元格中的空白/"无"/nan统一成 `None`。
//! 当前生效的目录放在 [`CatalogStore`] 里, 替换时整体换一个 `Arc`,
//! 正在分组的请求始终看到完整的一代目录。

use csv::StringRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::error::{DipError, Result};
use crate::model::{
    DiagnosisEntry, DiseaseType, DipGroupRecord, ProcedureCategory, ProcedureEntry,
};

pub const DIP_REQUIRED_COLUMNS: &[&str] =
    &["诊断名称", "诊断编码", "操作名称", "操作编码", "入组的DIP基准分值"];
pub const SURGERY_REQUIRED_COLUMNS: &[&str] = &["操作编码", "操作名称", "操作类别"];
pub const DIAGNOSIS_REQUIRED_COLUMNS: &[&str] = &["诊断编码", "诊断名称"];

// 内置的默认目录
const BUNDLED_DIP: &str = include_str!("../data/default_dip_catalog.csv");
const BUNDLED_SURGERY: &str = include_str!("../data/default_surgery_catalog.csv");
const BUNDLED_DIAGNOSIS: &str = include_str!("../data/default_diagnosis_catalog.csv");

/// 目录来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CatalogSource {
    Bundled,
    Uploaded(String),
}

impl std::fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogSource::Bundled => f.write_str("默认数据"),
            CatalogSource::Uploaded(origin) => write!(f, "上传文件 {}", origin),
        }
    }
}

// 表格读取===========================================================================

/// 读进来但还没反序列化的表格, 表头+字符串行
#[derive(Debug, Clone)]
pub struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        // Excel导出的CSV可能带BOM, 表头两侧也可能有空格
        let headers: StringRecord = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();
        let mut rows = Vec::new();
        for result in rdr.records() {
            rows.push(result?);
        }
        Ok(Self { headers, rows })
    }

    /// JSON格式为对象数组, 每个对象一行, 数字和null都转成单元格字符串
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let objects: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_reader(reader)?;
        let mut names: Vec<String> = Vec::new();
        for obj in &objects {
            for key in obj.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        let rows = objects
            .iter()
            .map(|obj| {
                names
                    .iter()
                    .map(|n| match obj.get(n) {
                        None | Some(serde_json::Value::Null) => String::new(),
                        Some(serde_json::Value::String(s)) => s.clone(),
                        Some(v) => v.to_string(),
                    })
                    .collect::<StringRecord>()
            })
            .collect();
        let headers = names.iter().map(|n| n.trim()).collect();
        Ok(Self { headers, rows })
    }

    /// 按扩展名区分JSON, 其余一律当作CSV
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DipError::CatalogIo(format!("{}: {}", path.display(), e)))?;
        let reader = BufReader::new(file);
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_reader(reader)
        } else {
            Self::from_csv_reader(reader)
        }
    }

    /// 按必要列的顺序返回缺少的列
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|col| !self.headers.iter().any(|h| h == **col))
            .map(|col| col.to_string())
            .collect()
    }

    fn deserialize_rows<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(self.rows.len());
        for (idx, row) in self.rows.iter().enumerate() {
            let item: T = row.deserialize(Some(&self.headers)).map_err(|e| {
                // 行号从数据第一行算起, 表头不计
                DipError::CatalogIo(format!("第{}行: {}", idx + 1, e))
            })?;
            out.push(item);
        }
        Ok(out)
    }
}

// 自定义反序列化
pub(crate) mod custom_deserializer {
    use serde::{self, Deserialize, Deserializer};
    use tracing::warn;

    use crate::normalize::clean_opt;

    // 文本列, 空白/"无"/nan都视为None
    pub fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(clean_opt(s.as_deref()))
    }

    pub fn deserialize_parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: std::str::FromStr,
    {
        let s = deserialize_text(deserializer)?;
        Ok(s.and_then(|s| s.parse::<T>().ok()))
    }

    // f64类型的反序列化
    pub fn deserialize_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();

        // 处理空字符串或纯空白
        if s.trim().is_empty() {
            return Ok(0.0);
        }

        // 清理字符串：移除空格和千位分隔符
        let clean_str = s.replace(' ', "").replace(',', "");

        match clean_str.parse::<f64>() {
            Ok(num) => Ok(num),
            Err(e) => Err(serde::de::Error::custom(format!(
                "无法解析数值 {:?}: {}",
                s, e
            ))),
        }
    }

    // 序号、病例数这类可选计数列, 表格软件常导出成"7568.0"; 无法解析时记为0, 不拒收整表
    pub fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        let clean_str = s.replace(' ', "").replace(',', "");
        if clean_str.is_empty() {
            return Ok(0);
        }
        match clean_str.parse::<f64>() {
            Ok(num) if num >= 0.0 && num.fract() == 0.0 && num <= u32::MAX as f64 => Ok(num as u32),
            _ => {
                warn!("无效的计数 {:?}, 按0处理", s);
                Ok(0)
            }
        }
    }
}

// 目录行结构, 列名即目录表头, 只在读取时使用
#[derive(Debug, Deserialize)]
pub struct DipRow {
    #[serde(rename = "序号", default, deserialize_with = "custom_deserializer::deserialize_count")]
    sequence_no: u32,
    #[serde(rename = "DIP编码", default, deserialize_with = "custom_deserializer::deserialize_text")]
    group_code: Option<String>,
    #[serde(rename = "DIP名称", default, deserialize_with = "custom_deserializer::deserialize_text")]
    group_name: Option<String>,
    #[serde(rename = "病种类型", default, deserialize_with = "custom_deserializer::deserialize_parsed")]
    disease_type: Option<DiseaseType>,
    #[serde(rename = "诊断编码", default, deserialize_with = "custom_deserializer::deserialize_text")]
    diagnosis_code: Option<String>,
    #[serde(rename = "诊断名称", default, deserialize_with = "custom_deserializer::deserialize_text")]
    diagnosis_name: Option<String>,
    #[serde(rename = "操作编码", default, deserialize_with = "custom_deserializer::deserialize_text")]
    procedure_code: Option<String>,
    #[serde(rename = "操作名称", default, deserialize_with = "custom_deserializer::deserialize_text")]
    procedure_name: Option<String>,
    #[serde(rename = "病例数", default, deserialize_with = "custom_deserializer::deserialize_count")]
    case_count: u32,
    #[serde(rename = "入组的DIP基准分值", default, deserialize_with = "custom_deserializer::deserialize_f64")]
    base_score: f64,
}

#[derive(Debug, Deserialize)]
pub struct SurgeryRow {
    #[serde(rename = "操作编码", default, deserialize_with = "custom_deserializer::deserialize_text")]
    code: Option<String>,
    #[serde(rename = "操作名称", default, deserialize_with = "custom_deserializer::deserialize_text")]
    name: Option<String>,
    #[serde(rename = "操作类别", default, deserialize_with = "custom_deserializer::deserialize_parsed")]
    category: Option<ProcedureCategory>,
}

#[derive(Debug, Deserialize)]
pub struct DiagnosisRow {
    #[serde(rename = "诊断编码", default, deserialize_with = "custom_deserializer::deserialize_text")]
    code: Option<String>,
    #[serde(rename = "诊断名称", default, deserialize_with = "custom_deserializer::deserialize_text")]
    name: Option<String>,
}

// 目录类型===========================================================================

/// 三张目录共用的读取流程: 查缺列 -> 逐行反序列化 -> 组装
pub trait Catalog: Sized {
    /// 报错时使用的目录名
    const NAME: &'static str;
    const REQUIRED_COLUMNS: &'static [&'static str];
    const BUNDLED: &'static str;
    type Row: DeserializeOwned;

    fn from_rows(rows: Vec<Self::Row>, source: CatalogSource) -> Self;

    fn len(&self) -> usize;

    fn from_table(table: &Table, source: CatalogSource) -> Result<Self> {
        let missing = table.missing_columns(Self::REQUIRED_COLUMNS);
        if !missing.is_empty() {
            return Err(DipError::CatalogSchema {
                catalog: Self::NAME,
                missing,
            });
        }
        let rows = table.deserialize_rows::<Self::Row>()?;
        Ok(Self::from_rows(rows, source))
    }

    fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let table = Table::from_path(path)?;
        Self::from_table(&table, CatalogSource::Uploaded(path.display().to_string()))
    }

    /// 从CSV文本读取, 来源记为给定的名字
    fn from_csv_str(text: &str, origin: &str) -> Result<Self> {
        let table = Table::from_csv_reader(text.as_bytes())?;
        Self::from_table(&table, CatalogSource::Uploaded(origin.to_string()))
    }

    fn bundled() -> Result<Self> {
        let table = Table::from_csv_reader(Self::BUNDLED.as_bytes())?;
        Self::from_table(&table, CatalogSource::Bundled)
    }
}

/// DIP病种及分值目录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DipCatalog {
    pub source: CatalogSource,
    records: Vec<DipGroupRecord>,
}

impl DipCatalog {
    pub fn records(&self) -> &[DipGroupRecord] {
        &self.records
    }
}

impl Catalog for DipCatalog {
    const NAME: &'static str = "DIP目录";
    const REQUIRED_COLUMNS: &'static [&'static str] = DIP_REQUIRED_COLUMNS;
    const BUNDLED: &'static str = BUNDLED_DIP;
    type Row = DipRow;

    fn from_rows(rows: Vec<DipRow>, source: CatalogSource) -> Self {
        let records = rows
            .into_iter()
            .map(|r| DipGroupRecord {
                sequence_no: r.sequence_no,
                group_code: r.group_code,
                group_name: r.group_name,
                disease_type: r.disease_type,
                diagnosis_code: r.diagnosis_code,
                diagnosis_name: r.diagnosis_name,
                procedure_code: r.procedure_code,
                procedure_name: r.procedure_name,
                case_count: r.case_count,
                base_score: r.base_score,
            })
            .collect();
        Self { source, records }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// 手术操作分类目录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurgeryCatalog {
    pub source: CatalogSource,
    entries: Vec<ProcedureEntry>,
}

impl SurgeryCatalog {
    pub fn entries(&self) -> &[ProcedureEntry] {
        &self.entries
    }
}

impl Catalog for SurgeryCatalog {
    const NAME: &'static str = "手术操作分类目录";
    const REQUIRED_COLUMNS: &'static [&'static str] = SURGERY_REQUIRED_COLUMNS;
    const BUNDLED: &'static str = BUNDLED_SURGERY;
    type Row = SurgeryRow;

    fn from_rows(rows: Vec<SurgeryRow>, source: CatalogSource) -> Self {
        let entries = rows
            .into_iter()
            .map(|r| ProcedureEntry {
                code: r.code,
                name: r.name,
                category: r.category,
            })
            .collect();
        Self { source, entries }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// 诊断编码及名称目录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisCatalog {
    pub source: CatalogSource,
    entries: Vec<DiagnosisEntry>,
}

impl DiagnosisCatalog {
    pub fn entries(&self) -> &[DiagnosisEntry] {
        &self.entries
    }
}

impl Catalog for DiagnosisCatalog {
    const NAME: &'static str = "诊断编码及名称目录";
    const REQUIRED_COLUMNS: &'static [&'static str] = DIAGNOSIS_REQUIRED_COLUMNS;
    const BUNDLED: &'static str = BUNDLED_DIAGNOSIS;
    type Row = DiagnosisRow;

    fn from_rows(rows: Vec<DiagnosisRow>, source: CatalogSource) -> Self {
        let entries = rows
            .into_iter()
            .map(|r| DiagnosisEntry {
                code: r.code,
                name: r.name,
            })
            .collect();
        Self { source, entries }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// 目录仓库===========================================================================

/// 一代完整的目录, 分组引擎只读它
#[derive(Debug, Clone)]
pub struct CatalogSet {
    pub dip: Arc<DipCatalog>,
    pub surgery: Arc<SurgeryCatalog>,
    pub diagnosis: Arc<DiagnosisCatalog>,
    pub generation: u64,
}

impl CatalogSet {
    pub fn new(dip: DipCatalog, surgery: SurgeryCatalog, diagnosis: DiagnosisCatalog) -> Self {
        Self {
            dip: Arc::new(dip),
            surgery: Arc::new(surgery),
            diagnosis: Arc::new(diagnosis),
            generation: 0,
        }
    }
}

/// 当前生效的目录, 替换/恢复默认都是整体换掉 `Arc<CatalogSet>`
#[derive(Debug)]
pub struct CatalogStore {
    current: RwLock<Arc<CatalogSet>>,
    defaults: CatalogSet,
}

impl CatalogStore {
    pub fn new(defaults: CatalogSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(defaults.clone())),
            defaults,
        }
    }

    /// 使用内置的默认目录
    pub fn with_bundled() -> Result<Self> {
        let defaults = CatalogSet::new(
            DipCatalog::bundled()?,
            SurgeryCatalog::bundled()?,
            DiagnosisCatalog::bundled()?,
        );
        Ok(Self::new(defaults))
    }

    /// 取当前这一代目录
    pub fn snapshot(&self) -> Arc<CatalogSet> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    // 在写锁内基于当前一代生成新一代并整体替换, 返回新的代号
    fn update(&self, f: impl FnOnce(&CatalogSet) -> CatalogSet) -> u64 {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = f(&guard);
        next.generation = guard.generation + 1;
        let generation = next.generation;
        *guard = Arc::new(next);
        generation
    }

    pub fn replace_dip(&self, catalog: DipCatalog) -> u64 {
        let catalog = Arc::new(catalog);
        self.update(|cur| CatalogSet { dip: catalog, ..cur.clone() })
    }

    pub fn replace_surgery(&self, catalog: SurgeryCatalog) -> u64 {
        let catalog = Arc::new(catalog);
        self.update(|cur| CatalogSet { surgery: catalog, ..cur.clone() })
    }

    pub fn replace_diagnosis(&self, catalog: DiagnosisCatalog) -> u64 {
        let catalog = Arc::new(catalog);
        self.update(|cur| CatalogSet { diagnosis: catalog, ..cur.clone() })
    }

    /// 导入DIP目录, 失败时保留原目录并返回错误
    pub fn upload_dip<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let catalog = load_logged::<DipCatalog>(path.as_ref())?;
        let n = catalog.len();
        self.replace_dip(catalog);
        Ok(n)
    }

    pub fn upload_surgery<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let catalog = load_logged::<SurgeryCatalog>(path.as_ref())?;
        let n = catalog.len();
        self.replace_surgery(catalog);
        Ok(n)
    }

    pub fn upload_diagnosis<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let catalog = load_logged::<DiagnosisCatalog>(path.as_ref())?;
        let n = catalog.len();
        self.replace_diagnosis(catalog);
        Ok(n)
    }

    /// 撤下上传的目录, 恢复为默认数据
    pub fn withdraw_dip(&self) -> u64 {
        info!("恢复默认{}", DipCatalog::NAME);
        let dip = Arc::clone(&self.defaults.dip);
        self.update(|cur| CatalogSet { dip, ..cur.clone() })
    }

    pub fn withdraw_surgery(&self) -> u64 {
        info!("恢复默认{}", SurgeryCatalog::NAME);
        let surgery = Arc::clone(&self.defaults.surgery);
        self.update(|cur| CatalogSet { surgery, ..cur.clone() })
    }

    pub fn withdraw_diagnosis(&self) -> u64 {
        info!("恢复默认{}", DiagnosisCatalog::NAME);
        let diagnosis = Arc::clone(&self.defaults.diagnosis);
        self.update(|cur| CatalogSet { diagnosis, ..cur.clone() })
    }
}

fn load_logged<C: Catalog>(path: &Path) -> Result<C> {
    match C::from_path(path) {
        Ok(catalog) => {
            info!("成功导入{}！共 {} 条记录 ({})", C::NAME, catalog.len(), path.display());
            Ok(catalog)
        }
        Err(e) => {
            warn!("{}导入失败, 保留原目录: {}", C::NAME, e);
            Err(e)
        }
    }
}
