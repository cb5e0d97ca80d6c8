// ---------------------------------------------------------------------------
// Stub extraction — collapse function bodies, keep structure
// ---------------------------------------------------------------------------

// ---------------------------------------------------------------------------
// Language family classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LanguageFamily {
    BraceBased,
    IndentBased,
    ConfigIni,
    ConfigStructured,
    Unknown,
}

pub fn classify_language(ext: &str) -> LanguageFamily {
    match ext {
        // Brace-based languages
        "h" | "hpp" | "hxx" | "cpp" | "cxx" | "cc" | "c" | "cs" | "java" | "kt" | "scala"
        | "rs" | "go" | "js" | "ts" | "jsx" | "tsx" | "mjs" | "cjs" | "swift" | "usf" | "ush"
        | "hlsl" | "glsl" | "vert" | "frag" | "comp" | "wgsl" | "d" | "ps1" | "psm1" | "psd1" => {
            LanguageFamily::BraceBased
        }
        // Indent-based languages
        "py" | "rb" => LanguageFamily::IndentBased,
        // INI/CFG config
        "ini" | "cfg" | "conf" => LanguageFamily::ConfigIni,
        // Structured config (JSON, YAML, TOML, XML)
        "json" | "yaml" | "yml" | "toml" | "xml" => LanguageFamily::ConfigStructured,
        // Unknown
        _ => LanguageFamily::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Main stub extraction entry point
// ---------------------------------------------------------------------------

/// Extract structural stubs from source code by language family.
/// Keeps: imports, macros, class/struct/enum/namespace declarations,
/// function signatures, member variables, type aliases.
/// Replaces: function/method bodies with `{ /* ... */ }`
pub fn extract_stubs(content: &str, ext: &str) -> String {
    match classify_language(ext) {
        LanguageFamily::ConfigIni => stub_ini(content),
        LanguageFamily::IndentBased => stub_python(content),
        LanguageFamily::ConfigStructured => stub_structured(content, ext),
        LanguageFamily::Unknown => stub_fallback(content),
        LanguageFamily::BraceBased => stub_brace_based(content),
    }
}

// ---------------------------------------------------------------------------
// Brace-based stub extraction (C/C++, Java, C#, Rust, Go, JS/TS, etc.)
// ---------------------------------------------------------------------------

fn stub_brace_based(content: &str) -> String {
    let mut out = String::with_capacity(content.len() / 3);
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;
    let mut brace_depth: i32 = 0;
    let mut scope_is_structural: Vec<bool> = Vec::new();
    let mut in_block_comment = false;
    let mut skip_until_close_brace: Option<i32> = None;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if in_block_comment {
            if trimmed.contains("*/") {
                in_block_comment = false;
            }
            i += 1;
            continue;
        }

        if let Some(target) = skip_until_close_brace {
            for ch in line.chars() {
                match ch {
                    '{' => brace_depth += 1,
                    '}' => {
                        brace_depth -= 1;
                        if brace_depth <= target {
                            skip_until_close_brace = None;
                            if !scope_is_structural.is_empty() {
                                scope_is_structural.pop();
                            }
                            break;
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
            continue;
        }

        if trimmed.starts_with("/*") && !trimmed.contains("*/") {
            in_block_comment = true;
            i += 1;
            continue;
        }

        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("//")
            || trimmed.starts_with("using ")
            || trimmed.starts_with("typedef ")
            || trimmed.starts_with("template")
            || trimmed.starts_with("friend ")
            || trimmed.starts_with("import ")
            || trimmed.starts_with("from ")
            || trimmed.starts_with("use ")
            || trimmed.starts_with("mod ")
            || trimmed.starts_with("extern ")
            || trimmed.starts_with("package ")
            || is_annotation_or_macro(trimmed)
        {
            out.push_str(line);
            out.push('\n');
            i += 1;
            continue;
        }

        let has_open = trimmed.contains('{');
        let has_close = trimmed.contains('}');

        if has_open {
            let is_structural = is_structural_scope(trimmed, &lines, i);

            if is_structural {
                out.push_str(line);
                out.push('\n');
                for ch in line.chars() {
                    match ch {
                        '{' => {
                            brace_depth += 1;
                            scope_is_structural.push(true);
                        }
                        '}' => {
                            brace_depth -= 1;
                            scope_is_structural.pop();
                        }
                        _ => {}
                    }
                }
            } else {
                let sig = line_before_brace(line);
                out.push_str(sig);
                out.push_str(" { /* ... */ }\n");

                if has_close && line.rfind('}').unwrap_or(0) > line.find('{').unwrap_or(0) {
                    // Single-line body — already stubbed
                } else {
                    let target_depth = brace_depth;
                    for ch in line.chars() {
                        match ch {
                            '{' => {
                                brace_depth += 1;
                                scope_is_structural.push(false);
                            }
                            '}' => {
                                brace_depth -= 1;
                                scope_is_structural.pop();
                            }
                            _ => {}
                        }
                    }
                    skip_until_close_brace = Some(target_depth);
                }
            }
            i += 1;
            continue;
        }

        if has_close {
            for ch in line.chars() {
                match ch {
                    '{' => {
                        brace_depth += 1;
                        scope_is_structural.push(true);
                    }
                    '}' => {
                        brace_depth -= 1;
                        scope_is_structural.pop();
                    }
                    _ => {}
                }
            }
            out.push_str(line);
            out.push('\n');
            i += 1;
            continue;
        }

        out.push_str(line);
        out.push('\n');
        i += 1;
    }

    // Remove excessive blank lines (3+ consecutive -> 2)
    let mut result = String::with_capacity(out.len());
    let mut blank_count = 0;
    for line in out.lines() {
        if line.trim().is_empty() {
            blank_count += 1;
            if blank_count <= 2 {
                result.push('\n');
            }
        } else {
            blank_count = 0;
            result.push_str(line);
            result.push('\n');
        }
    }

    result
}

/// Recognize annotations, macros, and attributes across languages.
pub fn is_annotation_or_macro(line: &str) -> bool {
    // Java/Kotlin annotations: @UpperCase
    if line.starts_with('@') && line.len() > 1 {
        let next = line.as_bytes()[1];
        if next.is_ascii_uppercase() {
            return true;
        }
    }

    // Rust attributes: #[...]
    if line.starts_with("#[") {
        return true;
    }

    // C# attributes: [UpperCase...] (not array indexing)
    if line.starts_with('[') && line.len() > 1 {
        let next = line.as_bytes()[1];
        if next.is_ascii_uppercase() {
            return true;
        }
    }

    // Go directives: //go:
    if line.starts_with("//go:") {
        return true;
    }

    // Generic ALL_CAPS_MACRO( pattern
    let bytes = line.as_bytes();
    if !bytes.is_empty() && bytes[0].is_ascii_uppercase() {
        if let Some(paren) = line.find('(') {
            let before = &line[..paren];
            if before.chars().all(|c| c.is_ascii_uppercase() || c == '_') && before.len() >= 3 {
                return true;
            }
        }
    }

    false
}

fn is_structural_scope(line: &str, lines: &[&str], idx: usize) -> bool {
    let check = |s: &str| -> bool {
        let t = s.trim();
        if t.starts_with("class ")
            || t.starts_with("struct ")
            || t.starts_with("namespace ")
            || t.starts_with("enum ")
            || t.starts_with("union ")
            || t.starts_with("interface ")
            || t.starts_with("trait ")
            || t.starts_with("impl ")
            || t.starts_with("module ")
            || t.starts_with("package ")
            || t.starts_with("object ")
            || t.contains("class ") && t.contains('{')
            || t.contains("struct ") && t.contains('{')
            || t.contains("namespace ") && t.contains('{')
            || t.contains("enum ") && t.contains('{')
            || t.contains("interface ") && t.contains('{')
            || t.contains("trait ") && t.contains('{')
            || t.contains("impl ") && t.contains('{')
        {
            return true;
        }
        if t.starts_with("extern ") {
            return true;
        }
        false
    };

    if check(line) {
        return true;
    }

    let trimmed = line.trim();
    if trimmed == "{" || trimmed.starts_with("{ ") || trimmed == "{}" {
        let mut j = idx.saturating_sub(1);
        while j > 0 && lines[j].trim().is_empty() {
            j -= 1;
        }
        // Walk past C++ inheritance continuation lines (: public Base, , public Other)
        while j > 0 {
            let lt = lines[j].trim();
            if lt.starts_with(',') || (lt.starts_with(':') && !lt.starts_with("::")) {
                j -= 1;
                while j > 0 && lines[j].trim().is_empty() {
                    j -= 1;
                }
            } else {
                break;
            }
        }
        if j < idx {
            return check(lines[j]);
        }
    }

    let before = line_before_brace(line).trim().to_string();
    if before.ends_with(')')
        || before.ends_with("const")
        || before.ends_with("override")
        || before.ends_with("final")
        || before.ends_with("noexcept")
        || before.ends_with("= 0")
        || before.ends_with("= default")
        || before.ends_with("= delete")
    {
        return false;
    }

    // Function with initializer list
    if before.contains(") :") || before.contains("):") {
        return false;
    }

    // Lambda
    if before.contains(']') && before.contains('(') {
        return false;
    }

    // Check for function keywords that indicate a non-structural scope
    let trimmed_before = before.trim();
    if trimmed_before.starts_with("fn ")
        || trimmed_before.starts_with("func ")
        || trimmed_before.starts_with("function ")
        || trimmed_before.contains(" fn ")
        || trimmed_before.contains(" func ")
        || trimmed_before.contains(" function ")
    {
        return false;
    }

    if before.ends_with('=') || before.ends_with("= ") {
        return true;
    }

    true
}

fn line_before_brace(line: &str) -> &str {
    match line.find('{') {
        Some(pos) => line[..pos].trim_end(),
        None => line,
    }
}

// ---------------------------------------------------------------------------
// INI stub extraction
// ---------------------------------------------------------------------------

fn stub_ini(content: &str) -> String {
    let mut out = String::new();
    let mut entries_in_section = 0;
    let max_entries = 5;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        if trimmed.starts_with('[') {
            entries_in_section = 0;
            out.push_str(line);
            out.push('\n');
            continue;
        }
        entries_in_section += 1;
        if entries_in_section <= max_entries {
            out.push_str(line);
            out.push('\n');
        } else if entries_in_section == max_entries + 1 {
            out.push_str("; ... (more entries)\n");
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Python stub extraction
// ---------------------------------------------------------------------------

fn stub_python(content: &str) -> String {
    let mut out = String::new();
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;
    let mut skip_body = false;
    let mut body_indent = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        let indent = line.len() - line.trim_start().len();

        if skip_body {
            if !trimmed.is_empty() && indent <= body_indent {
                skip_body = false;
            } else {
                if trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''") {
                    out.push_str(line);
                    out.push('\n');
                }
                i += 1;
                continue;
            }
        }

        if trimmed.starts_with("import ")
            || trimmed.starts_with("from ")
            || trimmed.starts_with('#')
            || trimmed.is_empty()
            || trimmed.starts_with('@')
        {
            out.push_str(line);
            out.push('\n');
        } else if trimmed.starts_with("class ")
            || trimmed.starts_with("def ")
            || trimmed.starts_with("async def ")
        {
            out.push_str(line);
            out.push('\n');
            if trimmed.starts_with("def ") || trimmed.starts_with("async def ") {
                body_indent = indent;
                skip_body = true;
                out.push_str(&" ".repeat(indent + 4));
                out.push_str("...\n");
            }
        } else if indent == 0 {
            out.push_str(line);
            out.push('\n');
        }

        i += 1;
    }
    out
}

// ---------------------------------------------------------------------------
// Structured config stub extraction (JSON, YAML, TOML, XML)
// ---------------------------------------------------------------------------

fn stub_structured(content: &str, ext: &str) -> String {
    match ext {
        "json" => stub_json(content),
        "yaml" | "yml" => stub_yaml(content),
        "toml" => stub_toml(content),
        "xml" => stub_xml(content),
        _ => stub_fallback(content),
    }
}

/// JSON: return keys to depth 2
fn stub_json(content: &str) -> String {
    // Simple approach: parse with serde_json, extract top-level structure
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(val) => {
            let mut out = String::new();
            format_json_depth(&val, &mut out, 0, 2);
            out
        }
        Err(_) => stub_fallback(content),
    }
}

fn format_json_depth(val: &serde_json::Value, out: &mut String, depth: usize, max_depth: usize) {
    let indent = "  ".repeat(depth);
    match val {
        serde_json::Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, value)) in map.iter().enumerate() {
                out.push_str(&"  ".repeat(depth + 1));
                out.push_str(&format!("\"{key}\": "));
                if depth + 1 >= max_depth {
                    match value {
                        serde_json::Value::Object(_) => out.push_str("{...}"),
                        serde_json::Value::Array(a) => {
                            out.push_str(&format!("[...{} items]", a.len()))
                        }
                        _ => out.push_str(&value.to_string()),
                    }
                } else {
                    format_json_depth(value, out, depth + 1, max_depth);
                }
                if i < map.len() - 1 {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&indent);
            out.push('}');
        }
        serde_json::Value::Array(arr) => {
            out.push_str(&format!("[...{} items]", arr.len()));
        }
        _ => out.push_str(&val.to_string()),
    }
}

/// YAML: return top-level keys and their immediate children
fn stub_yaml(content: &str) -> String {
    let mut out = String::new();
    for line in content.lines() {
        // Top-level lines (no leading whitespace) or first-level children (2-space indent)
        if (!line.starts_with(' ') && !line.starts_with('\t'))
            || (line.starts_with("  ") && !line.starts_with("    "))
            || (line.starts_with('\t') && !line.starts_with("\t\t"))
        {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// TOML: return section headers + first 5 keys per section
fn stub_toml(content: &str) -> String {
    let mut out = String::new();
    let mut entries_in_section = 0;
    let max_entries = 5;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        if trimmed.starts_with('[') {
            entries_in_section = 0;
            out.push_str(line);
            out.push('\n');
            continue;
        }
        entries_in_section += 1;
        if entries_in_section <= max_entries {
            out.push_str(line);
            out.push('\n');
        } else if entries_in_section == max_entries + 1 {
            out.push_str("# ... (more entries)\n");
        }
    }
    out
}

/// XML: return first 100 lines
fn stub_xml(content: &str) -> String {
    let lines: Vec<&str> = content.lines().take(100).collect();
    let mut out = lines.join("\n");
    if content.lines().count() > 100 {
        out.push_str("\n<!-- ... (truncated) -->\n");
    } else {
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Fallback: first 100 lines as-is
// ---------------------------------------------------------------------------

fn stub_fallback(content: &str) -> String {
    let lines: Vec<&str> = content.lines().take(100).collect();
    let mut out = lines.join("\n");
    if content.lines().count() > 100 {
        out.push_str("\n// ... (truncated at 100 lines)\n");
    } else {
        out.push('\n');
    }
    out
}
