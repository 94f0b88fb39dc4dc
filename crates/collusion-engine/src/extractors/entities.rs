//! Pattern-based entity extraction
//!
//! One small extractor per entity kind. Extraction is purely lexical: phone
//! numbers, e-mail addresses, bank accounts, ID numbers, fax numbers, company
//! names and role-introduced person names.
//!
//! Numbers must be bounded by non-digits. The regex engine has no lookaround, so
//! the numeric extractors walk the maximal digit runs of the text and test each
//! candidate against an anchored pattern instead.

use std::collections::{BTreeMap, HashSet};

use bid_types::EntityKind;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::digit_runs;
use crate::patterns::{context_window, BANK_ISSUER_PREFIXES, ROLE_KEYWORDS};

/// Characters kept on each side of a person mention
const PERSON_CONTEXT_CHARS: usize = 20;

lazy_static! {
    static ref PHONE_SHAPE: Regex =
        Regex::new(r"^(?:1[3-9][0-9]{9}|0[0-9]{2,3}-?[0-9]{7,8})$").unwrap();

    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap();

    /// Region, birth date (19xx/20xx), sequence and check character
    static ref ID_CARD_SHAPE: Regex = Regex::new(
        r"^[1-9][0-9]{5}(?:19|20)[0-9]{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12][0-9]|3[01])[0-9]{3}[0-9Xx]$"
    )
    .unwrap();

    static ref FAX_PATTERN: Regex =
        Regex::new(r"(?:传真|Fax)[：:\s]*(0[0-9]{2,3}-?[0-9]{7,8})").unwrap();

    static ref COMPANY_PATTERN: Regex = Regex::new(concat!(
        r"[\x{4e00}-\x{9fff}]{2,}(?:集团|公司|企业|工程|建设|建筑|市政|路桥|",
        r"设计院|研究院|咨询|监理|劳务|装饰|机电|安装|水利|环保|科技|",
        r"实业|投资|开发|物业|供应链)(?:有限)?(?:责任)?(?:公司|集团)?"
    ))
    .unwrap();

    static ref PERSON_NAME_SHAPE: Regex = Regex::new(r"^[\x{4e00}-\x{9fff}]{2,4}$").unwrap();

    /// Per role: "role: name" and "role 为/是 name"
    static ref ROLE_PATTERNS: Vec<(&'static str, [Regex; 2])> = ROLE_KEYWORDS
        .iter()
        .map(|role| {
            let role_re = regex::escape(role);
            let labelled = Regex::new(&format!(r"{role_re}[：:\s]+([^\s,，。；;：:]{{2,4}})")).unwrap();
            let copular = Regex::new(&format!(r"{role_re}\s*(?:为|是)\s*([^\s,，。；;：:]{{2,4}})")).unwrap();
            (*role, [labelled, copular])
        })
        .collect();
}

/// An entity found in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    /// Normalized form used for comparisons
    pub value: String,
    /// Form as written in the document
    pub surface: String,
    pub role: Option<String>,
    pub context: Option<String>,
}

impl Entity {
    fn plain(kind: EntityKind, value: impl Into<String>, surface: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            surface: surface.into(),
            role: None,
            context: None,
        }
    }
}

pub trait EntityExtractor: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Entities of this kind in first-seen order, without duplicates
    fn extract(&self, text: &str) -> Vec<Entity>;
}

/// Keep the first entity per value
fn dedup(entities: impl IntoIterator<Item = Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter(|e| seen.insert(e.value.clone()))
        .collect()
}

pub struct PhoneExtractor;

impl EntityExtractor for PhoneExtractor {
    fn kind(&self) -> EntityKind {
        EntityKind::PhoneNumber
    }

    fn extract(&self, text: &str) -> Vec<Entity> {
        let runs = digit_runs(text);
        let mut found = Vec::new();
        let mut k = 0;
        while k < runs.len() {
            let (start, end) = runs[k];
            // area code and number joined by a single hyphen
            if let Some(&(next_start, next_end)) = runs.get(k + 1) {
                if &text[end..next_start] == "-" && PHONE_SHAPE.is_match(&text[start..next_end]) {
                    let surface = &text[start..next_end];
                    found.push(Entity::plain(self.kind(), surface.replace('-', ""), surface));
                    k += 2;
                    continue;
                }
            }
            let surface = &text[start..end];
            if PHONE_SHAPE.is_match(surface) {
                found.push(Entity::plain(self.kind(), surface, surface));
            }
            k += 1;
        }
        dedup(found)
    }
}

pub struct EmailExtractor;

impl EntityExtractor for EmailExtractor {
    fn kind(&self) -> EntityKind {
        EntityKind::Email
    }

    fn extract(&self, text: &str) -> Vec<Entity> {
        dedup(EMAIL_PATTERN.find_iter(text).map(|m| {
            Entity::plain(self.kind(), m.as_str().to_lowercase(), m.as_str())
        }))
    }
}

pub struct BankAccountExtractor;

pub fn is_likely_bank_account(digits: &str) -> bool {
    (16..=19).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && BANK_ISSUER_PREFIXES.iter().any(|p| digits.starts_with(p))
}

/// First four and last four digits, the rest hidden
pub fn mask_account(account: &str) -> String {
    if account.len() <= 8 {
        return "****".to_string();
    }
    format!("{}****{}", &account[..4], &account[account.len() - 4..])
}

impl EntityExtractor for BankAccountExtractor {
    fn kind(&self) -> EntityKind {
        EntityKind::BankAccount
    }

    fn extract(&self, text: &str) -> Vec<Entity> {
        dedup(
            digit_runs(text)
                .into_iter()
                .map(|(s, e)| &text[s..e])
                .filter(|run| is_likely_bank_account(run))
                .map(|run| Entity::plain(self.kind(), run, run)),
        )
    }
}

pub struct IdCardExtractor;

impl EntityExtractor for IdCardExtractor {
    fn kind(&self) -> EntityKind {
        EntityKind::IdCard
    }

    fn extract(&self, text: &str) -> Vec<Entity> {
        let bytes = text.as_bytes();
        let candidates = digit_runs(text).into_iter().filter_map(|(s, e)| match e - s {
            18 => Some(&text[s..e]),
            // trailing check character, itself not followed by a digit
            17 if matches!(bytes.get(e), Some(b'X' | b'x'))
                && !bytes.get(e + 1).is_some_and(u8::is_ascii_digit) =>
            {
                Some(&text[s..e + 1])
            }
            _ => None,
        });
        dedup(
            candidates
                .filter(|c| ID_CARD_SHAPE.is_match(c))
                .map(|c| Entity::plain(self.kind(), c, c)),
        )
    }
}

pub struct FaxExtractor;

impl EntityExtractor for FaxExtractor {
    fn kind(&self) -> EntityKind {
        EntityKind::FaxNumber
    }

    fn extract(&self, text: &str) -> Vec<Entity> {
        dedup(FAX_PATTERN.captures_iter(text).filter_map(|cap| {
            let number = cap.get(1)?.as_str();
            let surface = cap.get(0)?.as_str();
            Some(Entity::plain(self.kind(), number.replace('-', ""), surface))
        }))
    }
}

pub struct CompanyNameExtractor;

impl EntityExtractor for CompanyNameExtractor {
    fn kind(&self) -> EntityKind {
        EntityKind::CompanyName
    }

    fn extract(&self, text: &str) -> Vec<Entity> {
        dedup(
            COMPANY_PATTERN
                .find_iter(text)
                .map(|m| Entity::plain(self.kind(), m.as_str(), m.as_str())),
        )
    }
}

/// Names introduced by a role keyword, e.g. `项目经理：张三`
pub struct PersonExtractor;

impl EntityExtractor for PersonExtractor {
    fn kind(&self) -> EntityKind {
        EntityKind::PersonName
    }

    fn extract(&self, text: &str) -> Vec<Entity> {
        let mut found = Vec::new();
        for (role, patterns) in ROLE_PATTERNS.iter() {
            for pattern in patterns {
                for cap in pattern.captures_iter(text) {
                    let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                        continue;
                    };
                    let name = name.as_str().trim();
                    if !PERSON_NAME_SHAPE.is_match(name) {
                        continue;
                    }
                    found.push(Entity {
                        kind: EntityKind::PersonName,
                        value: name.to_string(),
                        surface: name.to_string(),
                        role: Some(role.to_string()),
                        context: Some(context_window(
                            text,
                            whole.start(),
                            whole.end(),
                            PERSON_CONTEXT_CHARS,
                        )),
                    });
                }
            }
        }
        dedup(found)
    }
}

static EXTRACTORS: &[&dyn EntityExtractor] = &[
    &PersonExtractor,
    &PhoneExtractor,
    &EmailExtractor,
    &BankAccountExtractor,
    &IdCardExtractor,
    &FaxExtractor,
    &CompanyNameExtractor,
];

/// All entities found in one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntities {
    pub entities: Vec<Entity>,
}

impl DocumentEntities {
    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        for e in &self.entities {
            *counts.entry(e.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Run every extractor over `text`. Mentions of `own_company` are not reported.
pub fn extract_entities(text: &str, own_company: &str) -> DocumentEntities {
    let own_company = own_company.trim();
    let entities = EXTRACTORS
        .iter()
        .flat_map(|extractor| extractor.extract(text))
        .filter(|e| !(e.kind == EntityKind::CompanyName && e.value == own_company))
        .collect();
    DocumentEntities { entities }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(entities: Vec<Entity>) -> Vec<String> {
        entities.into_iter().map(|e| e.value).collect()
    }

    #[test]
    fn test_phone_numbers() {
        let text = "联系电话：13812345678，办公电话0571-88886666，编号213812345678901";
        let phones = PhoneExtractor.extract(text);
        assert_eq!(values(phones.clone()), vec!["13812345678", "057188886666"]);
        assert_eq!(phones[1].surface, "0571-88886666");
    }

    #[test]
    fn test_phone_duplicates_collapse() {
        let text = "13812345678 再次 13812345678";
        assert_eq!(PhoneExtractor.extract(text).len(), 1);
    }

    #[test]
    fn test_email_lowercased() {
        let emails = EmailExtractor.extract("邮箱：ZhangSan@Example.COM。");
        assert_eq!(values(emails), vec!["zhangsan@example.com"]);
    }

    #[test]
    fn test_bank_account_needs_issuer_prefix() {
        let text = "开户账号6222021234567890123，流水号1234567890123456";
        assert_eq!(values(BankAccountExtractor.extract(text)), vec!["6222021234567890123"]);
        assert_eq!(mask_account("6222021234567890123"), "6222****0123");
    }

    #[test]
    fn test_id_card() {
        let text = "身份证号：11010519491231002X，另一个33010219800101123";
        assert_eq!(values(IdCardExtractor.extract(text)), vec!["11010519491231002X"]);
        let eighteen = IdCardExtractor.extract("证件330102198001011234。");
        assert_eq!(eighteen.len(), 1);
    }

    #[test]
    fn test_fax() {
        let faxes = FaxExtractor.extract("传真：0571-88886667");
        assert_eq!(values(faxes), vec!["057188886667"]);
    }

    #[test]
    fn test_company_names() {
        let companies = CompanyNameExtractor.extract("承建单位：浙江宏达建设有限公司。");
        assert_eq!(values(companies), vec!["浙江宏达建设有限公司"]);
    }

    #[test]
    fn test_person_with_role_and_context() {
        let text = "本项目拟派项目经理：张三，技术负责人为李四。";
        let persons = PersonExtractor.extract(text);
        assert_eq!(values(persons.clone()), vec!["张三", "李四"]);
        assert_eq!(persons[0].role.as_deref(), Some("项目经理"));
        assert_eq!(persons[1].role.as_deref(), Some("技术负责人"));
        assert!(persons[0].context.as_deref().unwrap().contains("项目经理：张三"));
    }

    #[test]
    fn test_person_name_must_be_cjk() {
        assert!(PersonExtractor.extract("联系人：Tom Lee").is_empty());
    }

    #[test]
    fn test_extract_entities_skips_own_company() {
        let text = "投标人：浙江宏达建设有限公司，合作方杭州远景装饰有限公司";
        let entities = extract_entities(text, "浙江宏达建设有限公司");
        let companies: Vec<&str> = entities
            .of_kind(EntityKind::CompanyName)
            .map(|e| e.value.as_str())
            .collect();
        assert_eq!(companies, vec!["合作方杭州远景装饰有限公司"]);
        assert_eq!(entities.count(EntityKind::PhoneNumber), 0);
    }

    #[test]
    fn test_empty_text() {
        assert!(extract_entities("", "").entities.is_empty());
    }
}
