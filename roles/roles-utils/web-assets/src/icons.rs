use std::sync::OnceLock;

const STROKE: &str = "#4ade80";

pub const USERS_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#4ade80" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M16 21v-2a4 4 0 0 0-4-4H6a4 4 0 0 0-4 4v2"/><circle cx="9" cy="7" r="4"/><path d="M22 21v-2a4 4 0 0 0-3-3.87"/><path d="M16 3.13a4 4 0 0 1 0 7.75"/></svg>"##;
pub const CPU_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#4ade80" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><rect x="4" y="4" width="16" height="16" rx="2"/><rect x="9" y="9" width="6" height="6"/><path d="M9 1v3M15 1v3M9 20v3M15 20v3M20 9h3M20 14h3M1 9h3M1 14h3"/></svg>"##;
pub const BITCOIN_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#4ade80" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M8 5h6a3 3 0 0 1 0 6H8z"/><path d="M8 11h7a3.5 3.5 0 0 1 0 7H8z"/><path d="M8 5v13M6 5h2M6 18h2M10 3v2M13 3v2M10 18v2M13 18v2"/></svg>"##;
pub const CLOCK_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#4ade80" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><circle cx="12" cy="12" r="10"/><path d="M12 6v6l4 2"/></svg>"##;
pub const AWARD_ICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#4ade80" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><circle cx="12" cy="8" r="6"/><path d="M15.5 12.9 17 22l-5-3-5 3 1.5-9.1"/></svg>"##;
pub const FAVICON_INLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24" stroke="#4ade80" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><circle cx="12" cy="12" r="11" fill="#111827"/><path d="M9 6.5h4.5a2.5 2.5 0 0 1 0 5H9z"/><path d="M9 11.5h5a2.75 2.75 0 0 1 0 5.5H9z"/><path d="M9 6.5V17"/></svg>"##;

/// Card icons as `(css class, svg)`; each class renders its icon via `::before`.
const CARD_ICONS: &[(&str, &str)] = &[
    ("icon-users", USERS_ICON_INLINE_SVG),
    ("icon-cpu", CPU_ICON_INLINE_SVG),
    ("icon-bitcoin", BITCOIN_ICON_INLINE_SVG),
    ("icon-clock", CLOCK_ICON_INLINE_SVG),
    ("icon-award", AWARD_ICON_INLINE_SVG),
];

static CARD_ICON_CSS: OnceLock<String> = OnceLock::new();

fn encode_for_data_uri(svg: &str) -> String {
    svg.replace('#', "%23")
        .replace('<', "%3C")
        .replace('>', "%3E")
        .replace('"', "%22")
        .replace(' ', "%20")
}

pub fn favicon_inline_svg() -> &'static str {
    FAVICON_INLINE_SVG
}

pub fn data_uri(svg: &str) -> String {
    format!("data:image/svg+xml;charset=utf8,{}", encode_for_data_uri(svg))
}

fn icon_css(class: &str, svg: &str) -> String {
    format!(
        r#"
        .{class}::before {{
            content: '';
            display: inline-block;
            width: 1rem;
            height: 1rem;
            vertical-align: middle;
            background-image: url('{uri}');
            background-size: contain;
            background-repeat: no-repeat;
        }}
        .card:hover .{class}::before {{
            filter: drop-shadow(0 0 6px {stroke});
        }}
        "#,
        class = class,
        uri = data_uri(svg),
        stroke = STROKE,
    )
}

/// CSS for every card icon class, built once.
pub fn card_icon_css() -> &'static str {
    CARD_ICON_CSS
        .get_or_init(|| {
            CARD_ICONS
                .iter()
                .map(|(class, svg)| icon_css(class, svg))
                .collect()
        })
        .as_str()
}
