use super::handlers::{extensions, health, items, projects};
use utoipa::{
    openapi::{Contact, Info, InfoBuilder, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        projects::list_projects,
        projects::get_project,
        projects::create_project,
        projects::update_project,
        projects::delete_project,
        extensions::list_extensions,
        extensions::list_extensions_by_scope,
        extensions::create_extension,
        extensions::update_extension,
        extensions::delete_extension,
        items::list_items,
        items::get_item,
        items::create_item,
        items::update_item,
        items::delete_item,
    ),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "projects", description = "Projects own Project scope extensions"),
        (name = "extensions", description = "Extensions select the typecode scope of their items"),
        (name = "items", description = "Items and their allocated typecodes"),
    )
)]
struct ApiDoc;

/// `OpenAPI` document served at `/api-docs/openapi.json`.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut openapi = ApiDoc::openapi();
    openapi.info = cargo_info();
    openapi
}

fn cargo_info() -> Info {
    // Use Cargo.toml metadata instead of the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    let (name, email) = match author.find('<') {
        Some(start) => (
            &author[..start],
            Some(author[start + 1..].trim_end_matches('>')),
        ),
        None => (author, None),
    };
    let name = Some(name.trim()).filter(|name| !name.is_empty());
    let email = email.map(str::trim).filter(|email| !email.is_empty());
    (name, email)
}
