//! Fixed lookup tables and text helpers shared by the detectors
//!
//! Every table here is immutable and compiled into the binary. Detectors that
//! need a faster lookup build an index over them once through `lazy_static`.

use bid_types::CostCategory;

/// High-frequency words that carry no signal in tender documents
pub const STOP_WORDS: &[&str] = &[
    "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也",
    "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这", "他", "她",
    "它", "们", "那", "里", "能", "下", "过", "么", "多", "大", "小", "些", "之", "及", "与",
    "或", "等", "其", "中", "对", "而", "所", "以", "为", "被", "把", "从", "但", "如", "什么",
    "如何", "因为", "所以", "然后", "其中", "这个", "那个", "还是", "可以", "已经", "需要",
    "应该", "进行", "通过", "根据", "按照", "关于", "对于", "由于", "不同", "相同", "以及",
    "本", "该", "项", "个", "条", "份", "种", "方", "面", "次", "件", "部", "类", "组", "级",
    "层", "段", "章", "节", "款", "则", "条款", "工程", "建设", "施工", "项目", "单位", "公司",
    "企业", "投标", "招标", "采购", "方案", "技术", "质量", "安全", "管理", "服务", "标准",
    "要求", "规定", "规范", "合同", "文件", "材料", "设备", "人员", "负责", "组织", "实施",
];

/// Role keywords that introduce a named person in a bid
pub const ROLE_KEYWORDS: &[&str] = &[
    "项目经理",
    "技术负责人",
    "项目负责人",
    "法定代表人",
    "法人代表",
    "授权代表",
    "联系人",
    "负责人",
    "总工程师",
    "安全员",
    "质量员",
    "施工员",
    "资料员",
    "造价工程师",
    "监理工程师",
    "注册建造师",
];

/// Card issuer prefixes that make a long digit run look like a bank account
pub const BANK_ISSUER_PREFIXES: &[&str] = &[
    "621", "622", "623", "625", "626", "627", "628", "403", "404", "512", "516", "518", "520",
    "524", "558",
];

/// Round coefficients bidders tend to derive one price from another with
pub const FIXED_COEFFICIENTS: &[f64] = &[
    0.90, 0.92, 0.95, 0.96, 0.97, 0.98, 0.99, 1.01, 1.02, 1.03, 1.05, 1.08, 1.10,
];

/// Keywords that anchor a cost subtotal, in priority order per category
pub const COST_CATEGORY_KEYWORDS: &[(CostCategory, &[&str])] = &[
    (CostCategory::Labor, &["人工费", "人工成本", "劳务费", "工资"]),
    (CostCategory::Material, &["材料费", "材料成本", "主材费", "辅材费"]),
    (CostCategory::Equipment, &["机械费", "设备费", "机具费"]),
    (CostCategory::Management, &["管理费", "企业管理费"]),
    (CostCategory::Profit, &["利润"]),
    (CostCategory::Tax, &["税金", "税费", "增值税", "税率"]),
    (CostCategory::Other, &["措施费", "安全文明施工费", "规费", "其他费用"]),
];

/// Miswritten construction terms (wrong, correct)
pub const TYPO_TABLE: &[(&str, &str)] = &[
    ("钢筋混泥土", "钢筋混凝土"),
    ("混泥土", "混凝土"),
    ("沥清", "沥青"),
    ("勾逢", "勾缝"),
    ("抹会", "抹灰"),
    ("脚手加", "脚手架"),
    ("峻工", "竣工"),
    ("粱柱", "梁柱"),
    ("施公", "施工"),
    ("质梁", "质量"),
    ("验受", "验收"),
    ("竞彪", "竞标"),
    ("招彪", "招标"),
    ("予算", "预算"),
    ("慨算", "概算"),
    ("绝算", "决算"),
    ("工其", "工期"),
    ("监里", "监理"),
    ("仿水", "防水"),
    ("保问", "保温"),
    ("管到", "管道"),
    ("消仿", "消防"),
    ("排说", "排水"),
    ("承抱", "承包"),
    ("分抱", "分包"),
];

/// Superseded standard codes (obsolete code, replaced by, title)
pub const OBSOLETE_STANDARDS: &[(&str, &str, &str)] = &[
    ("GB50300-2001", "GB50300-2013", "建筑工程施工质量验收统一标准"),
    ("GB50010-2002", "GB50010-2010(2015版)", "混凝土结构设计规范"),
    ("GB50011-2001", "GB50011-2010(2016版)", "建筑抗震设计规范"),
    ("GB50009-2001", "GB50009-2012", "建筑结构荷载规范"),
    ("GB50007-2002", "GB50007-2011", "建筑地基基础设计规范"),
    ("GB50017-2003", "GB50017-2017", "钢结构设计标准"),
    ("GB/T50328-2001", "GB/T50328-2014", "建设工程文件归档规范"),
    ("GB50204-2002", "GB50204-2015", "混凝土结构工程施工质量验收规范"),
    ("GB50205-2001", "GB50205-2020", "钢结构工程施工质量验收标准"),
    ("JGJ46-2005", "JGJ46-2024", "施工现场临时用电安全技术规范"),
    ("JGJ59-2011", "JGJ59-2023", "建筑施工安全检查标准"),
];

/// CJK unified ideograph (U+4E00..=U+9FFF)
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Length in characters, not bytes
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Character offset of a byte offset
pub fn char_offset(text: &str, byte_pos: usize) -> usize {
    text[..byte_pos].chars().count()
}

/// Extract the text around a byte range, widened by `radius` characters on each side.
///
/// Offsets must lie on char boundaries (regex match offsets always do).
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let from = if radius == 0 { start } else { from };
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[from..to].trim().to_string()
}
