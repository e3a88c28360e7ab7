//! Conversion between named and numeric HTML character references.
//!
//! The rewrite pipeline works on numeric references internally: named
//! references are rewritten to their numeric form up front (`&auml;` to
//! `&#228;`), and can be rewritten back for callers that want readable
//! markup. Unknown names, malformed references, and bare ampersands pass
//! through unchanged in both directions.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Longest entity name this crate will scan for. HTML 4 names top out at
/// eight characters; the margin covers user-supplied vocabularies.
const MAX_NAME_LEN: usize = 32;

const MAX_HEX_DIGITS: usize = 6; // 0x10FFFF
const MAX_DEC_DIGITS: usize = 7; // 1114111

/// The named character references this crate understands, as
/// `(name, codepoint)` pairs.
static NAMED: &[(&str, u32)] = &[
    // XML predefined
    ("quot", 34),
    ("amp", 38),
    ("apos", 39),
    ("lt", 60),
    ("gt", 62),
    // Latin-1 supplement
    ("nbsp", 160),
    ("iexcl", 161),
    ("cent", 162),
    ("pound", 163),
    ("curren", 164),
    ("yen", 165),
    ("brvbar", 166),
    ("sect", 167),
    ("uml", 168),
    ("copy", 169),
    ("ordf", 170),
    ("laquo", 171),
    ("not", 172),
    ("shy", 173),
    ("reg", 174),
    ("macr", 175),
    ("deg", 176),
    ("plusmn", 177),
    ("sup2", 178),
    ("sup3", 179),
    ("acute", 180),
    ("micro", 181),
    ("para", 182),
    ("middot", 183),
    ("cedil", 184),
    ("sup1", 185),
    ("ordm", 186),
    ("raquo", 187),
    ("frac14", 188),
    ("frac12", 189),
    ("frac34", 190),
    ("iquest", 191),
    ("Agrave", 192),
    ("Aacute", 193),
    ("Acirc", 194),
    ("Atilde", 195),
    ("Auml", 196),
    ("Aring", 197),
    ("AElig", 198),
    ("Ccedil", 199),
    ("Egrave", 200),
    ("Eacute", 201),
    ("Ecirc", 202),
    ("Euml", 203),
    ("Igrave", 204),
    ("Iacute", 205),
    ("Icirc", 206),
    ("Iuml", 207),
    ("ETH", 208),
    ("Ntilde", 209),
    ("Ograve", 210),
    ("Oacute", 211),
    ("Ocirc", 212),
    ("Otilde", 213),
    ("Ouml", 214),
    ("times", 215),
    ("Oslash", 216),
    ("Ugrave", 217),
    ("Uacute", 218),
    ("Ucirc", 219),
    ("Uuml", 220),
    ("Yacute", 221),
    ("THORN", 222),
    ("szlig", 223),
    ("agrave", 224),
    ("aacute", 225),
    ("acirc", 226),
    ("atilde", 227),
    ("auml", 228),
    ("aring", 229),
    ("aelig", 230),
    ("ccedil", 231),
    ("egrave", 232),
    ("eacute", 233),
    ("ecirc", 234),
    ("euml", 235),
    ("igrave", 236),
    ("iacute", 237),
    ("icirc", 238),
    ("iuml", 239),
    ("eth", 240),
    ("ntilde", 241),
    ("ograve", 242),
    ("oacute", 243),
    ("ocirc", 244),
    ("otilde", 245),
    ("ouml", 246),
    ("divide", 247),
    ("oslash", 248),
    ("ugrave", 249),
    ("uacute", 250),
    ("ucirc", 251),
    ("uuml", 252),
    ("yacute", 253),
    ("thorn", 254),
    ("yuml", 255),
    // Latin extended and typographic
    ("OElig", 338),
    ("oelig", 339),
    ("Scaron", 352),
    ("scaron", 353),
    ("Yuml", 376),
    ("fnof", 402),
    ("circ", 710),
    ("tilde", 732),
    ("ensp", 8194),
    ("emsp", 8195),
    ("thinsp", 8201),
    ("ndash", 8211),
    ("mdash", 8212),
    ("lsquo", 8216),
    ("rsquo", 8217),
    ("sbquo", 8218),
    ("ldquo", 8220),
    ("rdquo", 8221),
    ("bdquo", 8222),
    ("dagger", 8224),
    ("Dagger", 8225),
    ("bull", 8226),
    ("hellip", 8230),
    ("permil", 8240),
    ("lsaquo", 8249),
    ("rsaquo", 8250),
    ("euro", 8364),
    ("trade", 8482),
    // Arrows and mathematical
    ("larr", 8592),
    ("uarr", 8593),
    ("rarr", 8594),
    ("darr", 8595),
    ("harr", 8596),
    ("forall", 8704),
    ("part", 8706),
    ("exist", 8707),
    ("empty", 8709),
    ("isin", 8712),
    ("notin", 8713),
    ("prod", 8719),
    ("sum", 8721),
    ("minus", 8722),
    ("radic", 8730),
    ("prop", 8733),
    ("infin", 8734),
    ("and", 8743),
    ("or", 8744),
    ("cap", 8745),
    ("cup", 8746),
    ("int", 8747),
    ("asymp", 8776),
    ("ne", 8800),
    ("equiv", 8801),
    ("le", 8804),
    ("ge", 8805),
    ("sub", 8834),
    ("sup", 8835),
    ("sube", 8838),
    ("supe", 8839),
    ("oplus", 8853),
    ("otimes", 8855),
    ("perp", 8869),
    ("sdot", 8901),
    // Greek
    ("Alpha", 913),
    ("Beta", 914),
    ("Gamma", 915),
    ("Delta", 916),
    ("Epsilon", 917),
    ("Zeta", 918),
    ("Eta", 919),
    ("Theta", 920),
    ("Iota", 921),
    ("Kappa", 922),
    ("Lambda", 923),
    ("Mu", 924),
    ("Nu", 925),
    ("Xi", 926),
    ("Omicron", 927),
    ("Pi", 928),
    ("Rho", 929),
    ("Sigma", 931),
    ("Tau", 932),
    ("Upsilon", 933),
    ("Phi", 934),
    ("Chi", 935),
    ("Psi", 936),
    ("Omega", 937),
    ("alpha", 945),
    ("beta", 946),
    ("gamma", 947),
    ("delta", 948),
    ("epsilon", 949),
    ("zeta", 950),
    ("eta", 951),
    ("theta", 952),
    ("iota", 953),
    ("kappa", 954),
    ("lambda", 955),
    ("mu", 956),
    ("nu", 957),
    ("xi", 958),
    ("omicron", 959),
    ("pi", 960),
    ("rho", 961),
    ("sigmaf", 962),
    ("sigma", 963),
    ("tau", 964),
    ("upsilon", 965),
    ("phi", 966),
    ("chi", 967),
    ("psi", 968),
    ("omega", 969),
];

static BY_NAME: LazyLock<HashMap<&'static str, u32>> =
    LazyLock::new(|| NAMED.iter().copied().collect());

static BY_CODEPOINT: LazyLock<HashMap<u32, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::with_capacity(NAMED.len());
    for (name, codepoint) in NAMED {
        map.entry(*codepoint).or_insert(*name);
    }
    map
});

/// Looks up the codepoint for a named reference (name without `&` and `;`).
pub fn codepoint_of(name: &str) -> Option<u32> {
    BY_NAME.get(name).copied()
}

/// Looks up the preferred name for a codepoint.
pub fn name_of(codepoint: u32) -> Option<&'static str> {
    BY_CODEPOINT.get(&codepoint).copied()
}

/// Bounded scan for the digits of a numeric reference. Returns the index
/// of the terminating `;` when the digit run is well-formed.
fn scan_numeric(bytes: &[u8], start: usize, max_digits: usize, is_hex: bool) -> Option<usize> {
    let mut j = start;
    let mut digits = 0usize;

    while j < bytes.len() {
        let b = bytes[j];
        if b == b';' {
            return (digits > 0).then_some(j);
        }
        if digits == max_digits {
            return None;
        }
        let ok = if is_hex {
            b.is_ascii_hexdigit()
        } else {
            b.is_ascii_digit()
        };
        if !ok {
            return None;
        }
        digits += 1;
        j += 1;
    }

    None
}

/// Bounded scan for an entity name. Returns the index of the terminating
/// `;` when the name is well-formed (whether or not it is known).
fn scan_name(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    let mut j = start + 1;
    while j < bytes.len() {
        let b = bytes[j];
        if b == b';' {
            return Some(j);
        }
        if !b.is_ascii_alphanumeric() || j - start >= MAX_NAME_LEN {
            return None;
        }
        j += 1;
    }
    None
}

/// If `s` begins with a well-formed numeric reference (`&#228;` or
/// `&#xE4;`), returns its byte length.
pub fn numeric_ref_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if !s.starts_with("&#") {
        return None;
    }
    let (digits_at, is_hex) = match bytes.get(2) {
        Some(b'x') | Some(b'X') => (3, true),
        _ => (2, false),
    };
    let max_digits = if is_hex { MAX_HEX_DIGITS } else { MAX_DEC_DIGITS };
    let semi = scan_numeric(bytes, digits_at, max_digits, is_hex)?;
    Some(semi + 1)
}

/// Decodes a single complete numeric reference. Invalid scalar values
/// (surrogates, out-of-range codepoints) yield `None`.
pub fn decode_numeric(entity: &str) -> Option<char> {
    let inner = entity.strip_prefix("&#")?.strip_suffix(';')?;
    let codepoint = if let Some(hex) = inner.strip_prefix(['x', 'X']) {
        if hex.is_empty() || hex.len() > MAX_HEX_DIGITS {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()?
    } else {
        if inner.is_empty() || inner.len() > MAX_DEC_DIGITS {
            return None;
        }
        inner.parse::<u32>().ok()?
    };
    char::from_u32(codepoint)
}

/// Rewrites every known named reference to its numeric form. Everything
/// else is copied through byte for byte.
pub fn to_numeric(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut copy_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'&' {
            i += 1;
            continue;
        }
        let Some(semi) = scan_name(bytes, i + 1) else {
            i += 1;
            continue;
        };
        let Some(codepoint) = codepoint_of(&input[i + 1..semi]) else {
            i += 1;
            continue;
        };
        out.push_str(&input[copy_start..i]);
        out.push_str(&format!("&#{};", codepoint));
        i = semi + 1;
        copy_start = i;
    }

    out.push_str(&input[copy_start..]);
    out
}

/// Rewrites every numeric reference with a known name back to the named
/// form. References without a name are copied through unchanged.
pub fn to_named(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut copy_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'&' {
            i += 1;
            continue;
        }
        let Some(len) = numeric_ref_len(&input[i..]) else {
            i += 1;
            continue;
        };
        let reference = &input[i..i + len];
        let name = decode_numeric(reference).and_then(|c| name_of(c as u32));
        let Some(name) = name else {
            i += len;
            continue;
        };
        out.push_str(&input[copy_start..i]);
        out.push_str(&format!("&{};", name));
        i += len;
        copy_start = i;
    }

    out.push_str(&input[copy_start..]);
    out
}

/// Decodes every well-formed numeric reference in `input` to its
/// character. References that do not decode to a valid scalar value are
/// copied through unchanged.
pub fn decode_numeric_refs(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut copy_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'&' {
            i += 1;
            continue;
        }
        let decoded = numeric_ref_len(&input[i..])
            .and_then(|len| decode_numeric(&input[i..i + len]).map(|c| (len, c)));
        let Some((len, c)) = decoded else {
            i += 1;
            continue;
        };
        out.push_str(&input[copy_start..i]);
        out.push(c);
        i += len;
        copy_start = i;
    }

    out.push_str(&input[copy_start..]);
    out
}
