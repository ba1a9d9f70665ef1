//! 空值规范化与诊断编码截断

/// 展示层使用的"无"
pub const NONE_MARKER: &str = "无";

// 把空白、"无"以及表格导出时常见的"nan"都视为没有值
pub fn clean_text(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v == NONE_MARKER || v.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(v.to_string())
    }
}

/// `Option<String>` 版本, 读取目录单元格时使用
pub fn clean_opt(value: Option<&str>) -> Option<String> {
    value.and_then(clean_text)
}

/// 展示用: 没有值的时候显示"无"
pub fn display_or_none(value: Option<&str>) -> &str {
    value.unwrap_or(NONE_MARKER)
}

/// 诊断编码截取到小数点后第一位
///
/// `H25.013 -> H25.0`, `I10.x00 -> I10.x`, 没有小数点的编码原样返回。
pub fn truncate_diagnosis_code(code: &str) -> String {
    match code.split_once('.') {
        Some((root, rest)) => {
            let first: String = rest.chars().take(1).collect();
            // 只取第一个小数点之后的第一个字符, 因此结果最多一个小数点
            let first = if first == "." { String::new() } else { first };
            format!("{}.{}", root, first)
        }
        None => code.to_string(),
    }
}

/// 以字母开头且含有数字, 就认为输入本身已经是诊断编码
pub fn looks_like_diagnosis_code(input: &str) -> bool {
    let mut chars = input.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() => input.chars().any(|c| c.is_ascii_digit()),
        _ => false,
    }
}
