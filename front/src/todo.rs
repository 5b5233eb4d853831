use eyre::eyre;
use recap_api::v1::Todo;
use uuid::Uuid;

/// Splits todos into active and completed, keeping their order.
pub fn partition(todos: &[Todo]) -> (Vec<&Todo>, Vec<&Todo>) {
    todos.iter().partition(|todo| !todo.completed)
}

pub fn view(todo: &Todo) -> String {
    let check = if todo.completed { "[x]" } else { "[ ]" };
    let id = todo.id.simple().to_string();

    let mut line = format!(
        "{check} {}  {}  ({}, {})",
        &id[..8],
        todo.title,
        todo.priority,
        todo.category
    );

    if !todo.description.is_empty() {
        line.push_str("\n             ");
        line.push_str(&todo.description);
    }

    line
}

/// Resolves a full id or a unique prefix of one against the listed todos.
pub fn resolve(todos: &[Todo], needle: &str) -> eyre::Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(needle) {
        return Ok(id);
    }

    let needle = needle.replace('-', "").to_ascii_lowercase();
    let mut matches = todos
        .iter()
        .filter(|todo| todo.id.simple().to_string().starts_with(&needle));

    match (matches.next(), matches.next()) {
        (Some(todo), None) => Ok(todo.id),
        (None, _) => Err(eyre!("no todo matches `{needle}`")),
        (Some(_), Some(_)) => Err(eyre!("`{needle}` matches more than one todo")),
    }
}
