//! Region flag heuristic for proxy names.
//!
//! Names are matched against a fixed table of region hints. The table is
//! scanned in declaration order and the first region with any matching
//! hint wins, so shared hints (a bare "US", a single CJK character) resolve
//! to whichever region is declared first.

use once_cell::sync::Lazy;
use regex::Regex;

/// Returned when no region can be determined.
pub const UNKNOWN_FLAG: &str = "🏴‍☠️";

pub const HONG_KONG: &str = "🇭🇰";
pub const TAIWAN: &str = "🇹🇼";
pub const CHINA: &str = "🇨🇳";

/// Region flags and the name fragments that indicate them.
const FLAGS: &[(&str, &[&str])] = &[
    ("🇦🇨", &["AC"]),
    ("🇦🇹", &["奥地利", "维也纳"]),
    ("🇦🇺", &["AU", "Australia", "Sydney", "澳大利亚", "澳洲", "墨尔本", "悉尼"]),
    ("🇧🇪", &["BE", "比利时"]),
    ("🇧🇬", &["保加利亚", "Bulgaria"]),
    ("🇧🇷", &["BR", "Brazil", "巴西", "圣保罗"]),
    (
        "🇨🇦",
        &["CA", "Canada", "Waterloo", "加拿大", "蒙特利尔", "温哥华", "楓葉", "枫叶", "滑铁卢", "多伦多"],
    ),
    ("🇨🇭", &["瑞士", "苏黎世", "Switzerland"]),
    ("🇩🇪", &["DE", "German", "GERMAN", "德国", "德國", "法兰克福"]),
    ("🇩🇰", &["丹麦"]),
    ("🇪🇸", &["ES", "西班牙", "Spain"]),
    ("🇪🇺", &["EU", "欧盟", "欧罗巴"]),
    ("🇫🇮", &["Finland", "芬兰", "赫尔辛基"]),
    ("🇫🇷", &["FR", "France", "法国", "法國", "巴黎"]),
    ("🇬🇧", &["UK", "GB", "England", "United Kingdom", "英国", "伦敦", "英"]),
    ("🇲🇴", &["MO", "Macao", "澳门", "CTM"]),
    ("🇭🇺", &["匈牙利", "Hungary"]),
    (
        HONG_KONG,
        &[
            "HK", "Hongkong", "Hong Kong", "香港", "深港", "沪港", "呼港", "HKT", "HKBN", "HGC", "WTT",
            "CMI", "穗港", "京港", "港",
        ],
    ),
    ("🇮🇩", &["Indonesia", "印尼", "印度尼西亚", "雅加达"]),
    ("🇮🇪", &["Ireland", "爱尔兰", "都柏林"]),
    ("🇮🇳", &["India", "印度", "孟买", "Mumbai"]),
    ("🇰🇵", &["KP", "朝鲜"]),
    ("🇰🇷", &["KR", "Korea", "KOR", "韩国", "首尔", "韩", "韓"]),
    ("🇱🇻", &["Latvia", "Latvija", "拉脱维亚"]),
    ("🇲🇽", &["MEX", "MX", "墨西哥"]),
    ("🇲🇾", &["MY", "Malaysia", "马来西亚", "吉隆坡"]),
    ("🇳🇱", &["NL", "Netherlands", "荷兰", "荷蘭", "尼德蘭", "阿姆斯特丹"]),
    ("🇵🇭", &["PH", "Philippines", "菲律宾"]),
    ("🇷🇴", &["RO", "罗马尼亚"]),
    (
        "🇷🇺",
        &[
            "RU", "Russia", "俄罗斯", "俄羅斯", "伯力", "莫斯科", "圣彼得堡", "西伯利亚", "新西伯利亚",
            "京俄", "杭俄",
        ],
    ),
    ("🇸🇦", &["沙特", "迪拜"]),
    ("🇸🇪", &["SE", "Sweden"]),
    (
        "🇸🇬",
        &["SG", "Singapore", "新加坡", "狮城", "沪新", "京新", "泉新", "穗新", "深新", "杭新", "广新"],
    ),
    ("🇹🇭", &["TH", "Thailand", "泰国", "泰國", "曼谷"]),
    ("🇹🇷", &["TR", "Turkey", "土耳其", "伊斯坦布尔"]),
    (
        TAIWAN,
        &["TW", "Taiwan", "台湾", "台北", "台中", "新北", "彰化", "CHT", "台", "HINET"],
    ),
    (
        "🇺🇸",
        &[
            "US", "USA", "America", "United States", "美国", "美", "京美", "波特兰", "达拉斯", "俄勒冈",
            "凤凰城", "费利蒙", "硅谷", "矽谷", "拉斯维加斯", "洛杉矶", "圣何塞", "圣克拉拉", "西雅图",
            "芝加哥", "沪美", "哥伦布", "纽约",
        ],
    ),
    ("🇻🇳", &["VN", "越南", "胡志明市"]),
    ("🇮🇹", &["Italy", "IT", "Nachash", "意大利", "米兰", "義大利"]),
    ("🇿🇦", &["South Africa", "南非"]),
    ("🇦🇪", &["United Arab Emirates", "阿联酋"]),
    (
        "🇯🇵",
        &[
            "JP", "Japan", "日", "日本", "东京", "大阪", "埼玉", "沪日", "穗日", "川日", "中日", "泉日",
            "杭日", "深日", "辽日", "广日",
        ],
    ),
    ("🇦🇷", &["AR", "阿根廷"]),
    ("🇳🇴", &["Norway", "挪威", "NO"]),
    (
        CHINA,
        &[
            "CN", "China", "回国", "中国", "江苏", "北京", "上海", "广州", "深圳", "杭州", "徐州", "青岛",
            "宁波", "镇江", "back",
        ],
    ),
    ("🏳️‍🌈", &["流量", "时间", "应急", "过期", "Bandwidth", "expire"]),
];

/// A pair of regional indicator symbols, i.e. one country flag.
static FLAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{1F1E6}-\x{1F1FF}]{2}").expect("static flag pattern"));

/// One or more flags at the start of a name, with surrounding whitespace.
static LEADING_FLAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[\x{1F1E6}-\x{1F1FF}]{2}\s*)+").expect("static flag pattern")
});

/// Determine the region flag for a proxy name.
pub fn get_flag(name: &str) -> &str {
    for (flag, hints) in FLAGS {
        if hints.iter().any(|hint| name.contains(hint)) {
            return flag;
        }
    }

    FLAG_PATTERN
        .find(name)
        .map(|m| m.as_str())
        .unwrap_or(UNKNOWN_FLAG)
}

/// Strip leading flag glyphs from a name.
pub fn remove_flag(name: &str) -> String {
    LEADING_FLAGS.replace(name, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_flag_by_hint() {
        assert_eq!(get_flag("HK 01"), HONG_KONG);
        assert_eq!(get_flag("香港 IPLC"), HONG_KONG);
        assert_eq!(get_flag("Tokyo Japan"), "🇯🇵");
        assert_eq!(get_flag("美国 洛杉矶"), "🇺🇸");
    }

    #[test]
    fn test_declaration_order_wins() {
        // "台" is a Taiwan hint, but "港" is declared earlier under Hong Kong.
        assert_eq!(get_flag("港台 relay"), HONG_KONG);
        // "UK" comes before "US"-style hints in the table.
        assert_eq!(get_flag("UK-US"), "🇬🇧");
    }

    #[test]
    fn test_existing_flag_fallback() {
        assert_eq!(get_flag("🇫🇷 Paris"), "🇫🇷");
        assert_eq!(get_flag("node zero"), UNKNOWN_FLAG);
    }

    #[test]
    fn test_remove_flag() {
        assert_eq!(remove_flag("🇭🇰 HK 01"), "HK 01");
        assert_eq!(remove_flag("🇭🇰🇺🇸 relay"), "relay");
        assert_eq!(remove_flag(" 🇭🇰  🇺🇸 relay"), "relay");
        assert_eq!(remove_flag("plain"), "plain");
    }
}
