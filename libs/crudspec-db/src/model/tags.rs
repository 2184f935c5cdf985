//! Parsing of the two field tag conventions.

/// What a single tag says about a field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct TagInfo {
    pub name: Option<String>,
    pub ignored: bool,
    pub primary: bool,
    pub unique: bool,
    pub foreign: bool,
    pub read_only: bool,
    pub not_null: bool,
}

/// Parse a positional tag: `"name,opt,opt"`.
///
/// The first segment is the column name (`-` ignores the field, empty keeps
/// the name unresolved). Options: `pk`, `unique`, `fk`, `notnull`,
/// `nullzero`, `scanonly`, `readonly`.
#[must_use]
pub fn parse_positional(tag: &str) -> TagInfo {
    let mut info = TagInfo::default();
    let mut parts = tag.split(',');

    match parts.next().map(str::trim) {
        Some("-") => {
            info.ignored = true;
            return info;
        }
        Some(name) if !name.is_empty() => info.name = Some(name.to_owned()),
        _ => {}
    }

    for opt in parts {
        match opt.trim().to_ascii_lowercase().as_str() {
            "pk" => info.primary = true,
            "unique" => info.unique = true,
            "fk" => info.foreign = true,
            "notnull" | "nullzero" => info.not_null = true,
            "scanonly" | "readonly" => info.read_only = true,
            _ => {}
        }
    }
    info
}

/// Parse a keyed tag: `"column:name;primaryKey;unique;foreignKey:x;->"`.
///
/// `->` and `<-:false` mark the field read-only, a bare `-` ignores it.
#[must_use]
pub fn parse_keyed(tag: &str) -> TagInfo {
    let mut info = TagInfo::default();
    if tag.trim() == "-" {
        info.ignored = true;
        return info;
    }

    for part in tag.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = match part.split_once(':') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (part, None),
        };
        match (key.to_ascii_lowercase().as_str(), value) {
            ("column", Some(name)) if !name.is_empty() => info.name = Some(name.to_owned()),
            ("primarykey" | "primary_key", _) => info.primary = true,
            ("unique" | "uniqueindex", _) => info.unique = true,
            ("foreignkey", _) => info.foreign = true,
            ("not null", _) => info.not_null = true,
            ("->", None) => info.read_only = true,
            ("<-", Some(v)) if v.eq_ignore_ascii_case("false") => info.read_only = true,
            _ => {}
        }
    }
    info
}

/// Name hint: the text before the first comma, `-` and empty meaning none.
#[must_use]
pub fn hint_name(hint: &str) -> Option<&str> {
    let name = hint.split(',').next().map_or("", str::trim);
    if name.is_empty() || name == "-" {
        None
    } else {
        Some(name)
    }
}
