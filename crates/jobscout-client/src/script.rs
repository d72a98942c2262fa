//! JavaScript snippets evaluated in the page by the browser session.
//!
//! Selectors are embedded as JSON literals so quoting never breaks the
//! script, and each `querySelector` call is guarded: a selector the browser
//! rejects counts as "no match" instead of aborting the whole probe.

use jobscout_core::traits::ReadyProbe;

fn json_list(selectors: &[String]) -> String {
    serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string())
}

/// Index of the first probe group with a matching element, or -1.
pub fn readiness(probe: &ReadyProbe) -> String {
    let groups: Vec<&[String]> = probe.groups.iter().map(|g| g.selectors.as_slice()).collect();
    let groups = serde_json::to_string(&groups).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
  const groups = {groups};
  const hit = (s) => {{ try {{ return document.querySelector(s) !== null; }} catch (e) {{ return false; }} }};
  for (let i = 0; i < groups.length; i++) {{
    if (groups[i].some(hit)) return i;
  }}
  return -1;
}})()"#
    )
}

/// Whether any of `selectors` matches.
pub fn any_present(selectors: &[String]) -> String {
    let list = json_list(selectors);
    format!(
        r#"(() => {{
  const sels = {list};
  return sels.some((s) => {{ try {{ return document.querySelector(s) !== null; }} catch (e) {{ return false; }} }});
}})()"#
    )
}

/// Click every visible, enabled element matching `selectors`; returns the count.
pub fn click_all(selectors: &[String]) -> String {
    let list = json_list(selectors);
    format!(
        r#"(() => {{
  const sels = {list};
  let clicked = 0;
  for (const s of sels) {{
    let els = [];
    try {{ els = document.querySelectorAll(s); }} catch (e) {{ continue; }}
    for (const el of els) {{
      if (el.offsetParent !== null && !el.disabled) {{ el.click(); clicked++; }}
    }}
  }}
  return clicked;
}})()"#
    )
}

/// Click the first element matching any of `selectors`; returns whether one was found.
pub fn click_first(selectors: &[String]) -> String {
    let list = json_list(selectors);
    format!(
        r#"(() => {{
  const sels = {list};
  for (const s of sels) {{
    let el = null;
    try {{ el = document.querySelector(s); }} catch (e) {{ continue; }}
    if (el) {{ el.click(); return true; }}
  }}
  return false;
}})()"#
    )
}

/// Empty an input so typing replaces a remembered value.
pub fn clear_input(selector: &str) -> String {
    let sel = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (el) el.value = '';
  return el !== null;
}})()"#
    )
}

pub const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight); true";
pub const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0); true";

#[cfg(test)]
mod tests {
    use super::*;
    use jobscout_core::traits::Readiness;
    use std::time::Duration;

    #[test]
    fn readiness_embeds_groups_in_order() {
        let probe = ReadyProbe::new(Duration::from_secs(1))
            .group(Readiness::ErrorSurface, &["div.err".to_string()])
            .group(Readiness::Content, &["h1".to_string(), "a[href*=\"/jobs/\"]".to_string()]);
        let js = readiness(&probe);
        assert!(js.contains(r#"const groups = [["div.err"],["h1","a[href*=\"/jobs/\"]"]];"#));
        assert!(js.contains("return -1;"));
    }

    #[test]
    fn selectors_are_json_escaped() {
        let js = clear_input("input[name='session_key']");
        assert!(js.contains(r#"document.querySelector("input[name='session_key']")"#));

        let js = click_first(&["</script>\"".to_string()]);
        assert!(js.contains(r#"["</script>\""]"#));
    }

    #[test]
    fn empty_selector_lists() {
        assert!(any_present(&[]).contains("const sels = [];"));
        assert!(click_all(&[]).contains("return clicked;"));
    }
}
