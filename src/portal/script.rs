//! In-page JavaScript used to drive the portal UI.
//!
//! All interaction with the login form and the enrollment chooser runs
//! inside the page as injected IIFEs, because the portal renders both
//! a desktop and a mobile variant of each control and only the visible
//! one accepts input. Every interpolated value passes through
//! [`sanitize_js_string`] first.

use super::modal::CONFIRM_WORDS;

/// Script that fills and submits the visible login form.
///
/// Returns `{ filled, submitted }`: `filled` is false when no visible
/// identifier/password pair exists on the page.
pub(crate) fn fill_login_form(identifier: &str, secret: &str) -> String {
    format!(
        r#"(() => {{
            const visible = (el) => !!el && el.getClientRects().length > 0 && el.offsetParent !== null;
            const users = [...document.querySelectorAll("input[type='text'], input[type='email'], input:not([type])")].filter(visible);
            const passes = [...document.querySelectorAll("input[type='password']")].filter(visible);
            if (!users.length || !passes.length) {{
                return {{ filled: false, submitted: false }};
            }}
            const fire = (el, value) => {{
                el.focus();
                el.value = value;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }};
            fire(users[0], '{}');
            fire(passes[0], '{}');
            const submits = [...document.querySelectorAll("button[type='submit'], input[type='submit'], button")].filter(visible);
            const btn = submits.find(b => /entrar|acessar|login|sign in/i.test(b.textContent || b.value || '')) || submits[0];
            if (btn) {{
                btn.click();
                return {{ filled: true, submitted: true }};
            }}
            const form = passes[0].closest('form');
            if (form) {{
                form.submit();
                return {{ filled: true, submitted: true }};
            }}
            return {{ filled: true, submitted: false }};
        }})()"#,
        sanitize_js_string(identifier),
        sanitize_js_string(secret)
    )
}

/// Script that answers the enrollment chooser modal, when present.
///
/// Picks the option whose label contains `preferred` (falling back to
/// the first option), then clicks a confirmation control. Returns
/// `{ found, confirmed }`; `found` is false when no option controls
/// exist, which is the common case of no modal at all.
pub(crate) fn dismiss_choice_modal(preferred: Option<&str>) -> String {
    let wanted = preferred.map(sanitize_js_string).unwrap_or_default();
    let words = CONFIRM_WORDS
        .iter()
        .map(|w| format!("'{w}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"(() => {{
            const opts = [...document.querySelectorAll("input[type='radio'], input[type='checkbox'], [role='radio'], [role='option']")];
            if (!opts.length) {{
                return {{ found: false, confirmed: false }};
            }}
            const labelFor = (el) => el.closest("label, li, tr, [class*='option'], [class*='item']") || el.parentElement;
            const wanted = '{}'.toLowerCase();
            let target = opts[0];
            if (wanted) {{
                const hit = opts.find(o => {{
                    const c = labelFor(o);
                    return c && (c.textContent || '').toLowerCase().includes(wanted);
                }});
                if (hit) target = hit;
            }}
            const container = labelFor(target);
            if (container) container.click();
            target.checked = true;
            target.dispatchEvent(new Event('change', {{ bubbles: true }}));
            const words = [{}];
            const controls = [...document.querySelectorAll("button, input[type='button'], input[type='submit'], [role='button'], a")];
            const btn = controls.find(b => {{
                const t = ((b.textContent || '') + ' ' + (b.value || '')).toLowerCase();
                return words.some(w => t.includes(w));
            }});
            if (btn) btn.click();
            return {{ found: true, confirmed: !!btn }};
        }})()"#,
        wanted, words
    )
}

/// Sanitize a string for safe injection into a JavaScript string literal.
///
/// Escapes everything that could break out of a JS string context:
/// backslashes, quotes, backticks, newlines, angle brackets, and strips
/// null bytes. Credentials pass through here.
pub(crate) fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_js_string("hello"), "hello");
        assert_eq!(sanitize_js_string("it's"), "it\\'s");
        assert_eq!(sanitize_js_string("a\"b"), "a\\\"b");
    }

    #[test]
    fn test_sanitize_xss() {
        let malicious = r#"</script><script>alert(1)</script>"#;
        let sanitized = sanitize_js_string(malicious);
        assert!(!sanitized.contains("</script>"));
        assert!(sanitized.contains("\\x3c/script\\x3e"));
    }

    #[test]
    fn test_sanitize_null_bytes() {
        assert_eq!(sanitize_js_string("abc\0def"), "abcdef");
    }

    #[test]
    fn test_login_script_escapes_credentials() {
        let script = fill_login_form("20231234", "pa'ss`wo\"rd");
        assert!(script.contains("20231234"));
        assert!(!script.contains("pa'ss`wo\"rd"));
        assert!(script.contains("pa\\'ss\\`wo\\\"rd"));
    }

    #[test]
    fn test_login_script_targets_visible_controls() {
        let script = fill_login_form("u", "p");
        assert!(script.contains("getClientRects"));
        assert!(script.contains("offsetParent"));
        assert!(script.contains("input[type='password']"));
    }

    #[test]
    fn test_modal_script_includes_confirm_vocabulary() {
        let script = dismiss_choice_modal(None);
        for word in CONFIRM_WORDS {
            assert!(script.contains(&format!("'{word}'")), "missing {word}");
        }
    }

    #[test]
    fn test_modal_script_lowercases_preferred_label() {
        let script = dismiss_choice_modal(Some("Engenharia 2024/1"));
        assert!(script.contains("Engenharia 2024/1"));
        assert!(script.contains(".toLowerCase()"));
    }
}
