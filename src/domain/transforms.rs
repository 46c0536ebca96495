//! Pure document transforms.
//!
//! Every function takes the current document by reference and returns a new
//! one. Unknown category or item ids fail with `ConfigError::NotFound` instead
//! of doing nothing, so a caller holding a stale view can tell.

use crate::domain::document::{
    Breakpoint, Category, ConfigDocument, CustomizationSettings, Item, LayoutFlag, LayoutSettings,
    Placement, Settings,
};
use crate::domain::error::{ConfigError, EntityKind};

pub type TransformResult = Result<ConfigDocument, ConfigError>;

pub fn update_settings(doc: &ConfigDocument, f: impl FnOnce(Settings) -> Settings) -> ConfigDocument {
    ConfigDocument {
        settings: f(doc.settings.clone()),
        ..doc.clone()
    }
}

pub fn update_customization(
    doc: &ConfigDocument,
    f: impl FnOnce(CustomizationSettings) -> CustomizationSettings,
) -> ConfigDocument {
    update_settings(doc, |settings| Settings {
        customization: f(settings.customization.clone()),
        ..settings
    })
}

pub fn update_layout(
    doc: &ConfigDocument,
    f: impl FnOnce(LayoutSettings) -> LayoutSettings,
) -> ConfigDocument {
    update_customization(doc, |customization| CustomizationSettings {
        layout: f(customization.layout),
        ..customization
    })
}

pub fn set_layout_flag(doc: &ConfigDocument, flag: LayoutFlag, value: bool) -> TransformResult {
    Ok(update_layout(doc, |layout| layout.with(flag, value)))
}

/// Blank titles clear the override so the default page title is used
pub fn set_meta_title(doc: &ConfigDocument, title: Option<&str>) -> TransformResult {
    let meta_title = title
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string);
    Ok(update_customization(doc, |customization| CustomizationSettings {
        meta_title,
        ..customization
    }))
}

pub fn category<'a>(doc: &'a ConfigDocument, category_id: &str) -> Result<&'a Category, ConfigError> {
    doc.categories
        .iter()
        .find(|c| c.id == category_id)
        .ok_or_else(|| ConfigError::category_not_found(category_id))
}

/// Locate an item and the id of the category that owns it
pub fn find_item<'a>(doc: &'a ConfigDocument, item_id: &str) -> Result<(&'a str, &'a Item), ConfigError> {
    doc.categories
        .iter()
        .find_map(|c| {
            c.items
                .iter()
                .find(|i| i.id == item_id)
                .map(|i| (c.id.as_str(), i))
        })
        .ok_or_else(|| ConfigError::item_not_found(item_id))
}

fn category_mut<'a>(doc: &'a mut ConfigDocument, category_id: &str) -> Result<&'a mut Category, ConfigError> {
    doc.categories
        .iter_mut()
        .find(|c| c.id == category_id)
        .ok_or_else(|| ConfigError::category_not_found(category_id))
}

fn item_mut<'a>(doc: &'a mut ConfigDocument, item_id: &str) -> Result<&'a mut Item, ConfigError> {
    doc.categories
        .iter_mut()
        .flat_map(|c| c.items.iter_mut())
        .find(|i| i.id == item_id)
        .ok_or_else(|| ConfigError::item_not_found(item_id))
}

/// Write one breakpoint's placement, leaving the others untouched
pub fn set_placement(
    doc: &ConfigDocument,
    item_id: &str,
    breakpoint: Breakpoint,
    placement: Placement,
) -> TransformResult {
    let mut next = doc.clone();
    item_mut(&mut next, item_id)?
        .placement
        .insert(breakpoint, placement.normalized());
    Ok(next)
}

/// Take an item out of its category and append it to `dest_category_id`,
/// placed at `placement` for `breakpoint`.
pub fn move_item(
    doc: &ConfigDocument,
    item_id: &str,
    dest_category_id: &str,
    breakpoint: Breakpoint,
    placement: Placement,
) -> TransformResult {
    category(doc, dest_category_id)?;
    let (source_id, _) = find_item(doc, item_id)?;
    let source_id = source_id.to_string();

    let mut next = doc.clone();
    let source = category_mut(&mut next, &source_id)?;
    let index = source
        .items
        .iter()
        .position(|i| i.id == item_id)
        .ok_or_else(|| ConfigError::item_not_found(item_id))?;
    let mut item = source.items.remove(index);
    item.placement.insert(breakpoint, placement.normalized());

    category_mut(&mut next, dest_category_id)?.items.push(item);
    Ok(next)
}

pub fn add_item(doc: &ConfigDocument, category_id: &str, item: Item) -> TransformResult {
    if find_item(doc, &item.id).is_ok() {
        return Err(ConfigError::DuplicateId {
            kind: EntityKind::Item,
            id: item.id,
        });
    }
    let mut next = doc.clone();
    category_mut(&mut next, category_id)?.items.push(item);
    Ok(next)
}

pub fn remove_item(doc: &ConfigDocument, item_id: &str) -> TransformResult {
    let (owner, _) = find_item(doc, item_id)?;
    let owner = owner.to_string();
    let mut next = doc.clone();
    category_mut(&mut next, &owner)?.items.retain(|i| i.id != item_id);
    Ok(next)
}

pub fn add_category(doc: &ConfigDocument, category: Category) -> TransformResult {
    if doc.categories.iter().any(|c| c.id == category.id) {
        return Err(ConfigError::DuplicateId {
            kind: EntityKind::Category,
            id: category.id,
        });
    }
    let mut next = doc.clone();
    next.categories.push(category);
    Ok(next)
}

/// Removes the category together with the items it owns
pub fn remove_category(doc: &ConfigDocument, category_id: &str) -> TransformResult {
    category(doc, category_id)?;
    let mut next = doc.clone();
    next.categories.retain(|c| c.id != category_id);
    Ok(next)
}

pub fn rename_category(doc: &ConfigDocument, category_id: &str, name: &str) -> TransformResult {
    let mut next = doc.clone();
    category_mut(&mut next, category_id)?.name = name.to_string();
    Ok(next)
}
