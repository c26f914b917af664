use crate::ui::{Icons, theme};

pub fn header(icon: &str, text: &str) {
    println!("{} {}", icon, theme().paint(text, |t| &t.title));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, theme().paint(label, |t| &t.ok));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, theme().paint(label, |t| &t.failure));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, theme().paint(label, |t| &t.caution));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        theme().paint(Icons::INFO, |t| &t.label),
        theme().paint(label, |t| &t.faint),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", theme().paint(title, |t| &t.title));
}

pub fn dim(text: &str) -> String {
    theme().paint(text, |t| &t.faint)
}

pub fn muted(text: &str) -> String {
    theme().paint(text, |t| &t.null)
}

/// `(subject)-[relation]->(object)` with nodes and the relation highlighted
pub fn triplet_line(subject: &str, relation: &str, object: &str) -> String {
    let theme = theme();
    format!(
        "({})-[{}]->({})",
        theme.paint(subject, |t| &t.node),
        theme.paint(relation, |t| &t.relation),
        theme.paint(object, |t| &t.node)
    )
}
