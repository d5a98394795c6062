//! Title → seniority ladder mapping used by the trajectory dimension.
//!
//! Ladder: intern 1, junior 2, mid 3, senior 4, staff/lead/manager 5,
//! principal 6, director 7, vp 8, c-level 9. Monotone in rank.

/// Ladder rank for a title, None when the title is empty.
pub fn seniority_rank(title: &str) -> Option<i32> {
    let lower = title.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }
    let has = |t: &str| tokens.contains(&t);

    if has("intern") || has("internship") {
        return Some(1);
    }
    if has("junior") || has("jr") {
        return Some(2);
    }
    // VP before the c-level check: "vice president" carries "president".
    if has("vp") || (has("vice") && has("president")) {
        return Some(8);
    }
    if has("chief")
        || has("ceo")
        || has("cto")
        || has("cfo")
        || has("coo")
        || has("founder")
        || has("cofounder")
        || has("president")
    {
        return Some(9);
    }
    if has("director") {
        return Some(7);
    }
    if has("principal") {
        return Some(6);
    }
    if has("staff") || has("lead") || has("manager") || has("head") {
        return Some(5);
    }
    if has("senior") || has("sr") {
        return Some(4);
    }
    // Unmarked titles sit at the mid rung.
    Some(3)
}

/// Coarse functional area, used for the cross-function breadth bonus.
pub fn function_area(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    let contains = |needle: &str| lower.contains(needle);

    if contains("research") || contains("scientist") {
        "research"
    } else if contains("data") || contains("analytics") {
        "data"
    } else if contains("product") {
        "product"
    } else if contains("design") {
        "design"
    } else if contains("market") || contains("growth") {
        "marketing"
    } else if contains("sales") || contains("account") {
        "sales"
    } else if contains("engineer") || contains("developer") || contains("sre") {
        "engineering"
    } else if contains("manager")
        || contains("director")
        || contains("vp")
        || contains("chief")
        || contains("head")
    {
        "management"
    } else {
        "other"
    }
}
