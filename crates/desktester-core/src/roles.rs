//! Role normalization
//!
//! Native roles (`AXButton`, UIA control type names) map to one canonical
//! vocabulary so locators are portable between backends.

/// macOS AX role to canonical name.
const MAC_ROLES: &[(&str, &str)] = &[
    ("AXButton", "button"),
    ("AXTextField", "text_field"),
    ("AXTextArea", "text_area"),
    ("AXStaticText", "static_text"),
    ("AXCheckBox", "checkbox"),
    ("AXRadioButton", "radio_button"),
    ("AXComboBox", "combo_box"),
    ("AXList", "list"),
    ("AXTable", "table"),
    ("AXWindow", "window"),
    ("AXGroup", "group"),
    ("AXMenuBar", "menu_bar"),
    ("AXMenuItem", "menu_item"),
    ("AXMenu", "menu"),
    ("AXSlider", "slider"),
    ("AXScrollArea", "scroll_area"),
    ("AXTabGroup", "tab_group"),
    ("AXToolbar", "toolbar"),
    ("AXImage", "image"),
    ("AXPopUpButton", "popup_button"),
    ("AXSheet", "sheet"),
    ("AXDialog", "dialog"),
    ("AXApplication", "application"),
    ("AXSplitGroup", "split_group"),
    ("AXScrollBar", "scroll_bar"),
    ("AXValueIndicator", "value_indicator"),
    ("AXLink", "link"),
    ("AXProgressIndicator", "progress_indicator"),
];

/// Windows UIA control type name to canonical name.
const UIA_ROLES: &[(&str, &str)] = &[
    ("Button", "button"),
    ("Edit", "text_field"),
    ("Document", "text_area"),
    ("Text", "static_text"),
    ("CheckBox", "checkbox"),
    ("RadioButton", "radio_button"),
    ("ComboBox", "combo_box"),
    ("List", "list"),
    ("ListItem", "list_item"),
    ("Table", "table"),
    ("DataGrid", "table"),
    ("Window", "window"),
    ("Group", "group"),
    ("Pane", "group"),
    ("MenuBar", "menu_bar"),
    ("MenuItem", "menu_item"),
    ("Menu", "menu"),
    ("Slider", "slider"),
    ("Tab", "tab_group"),
    ("TabItem", "tab"),
    ("ToolBar", "toolbar"),
    ("Image", "image"),
    ("SplitButton", "popup_button"),
    ("ScrollBar", "scroll_bar"),
    ("Hyperlink", "link"),
    ("ProgressBar", "progress_indicator"),
    ("TitleBar", "title_bar"),
];

/// Role produced for dock icons; clicks on these launch apps while recording.
pub const DOCK_ITEM: &str = "dockitem";

pub fn normalize_mac_role(native: &str) -> String {
    lookup(MAC_ROLES, native).map(str::to_string).unwrap_or_else(|| {
        native
            .strip_prefix("AX")
            .unwrap_or(native)
            .to_lowercase()
    })
}

pub fn normalize_uia_role(native: &str) -> String {
    lookup(UIA_ROLES, native)
        .map(str::to_string)
        .unwrap_or_else(|| native.to_lowercase())
}

/// Canonical name back to the macOS AX role, for mapped roles only.
pub fn mac_role(canonical: &str) -> Option<&'static str> {
    MAC_ROLES
        .iter()
        .find(|(_, c)| *c == canonical)
        .map(|(native, _)| *native)
}

/// Canonical name back to the first matching UIA control type name.
pub fn uia_role(canonical: &str) -> Option<&'static str> {
    UIA_ROLES
        .iter()
        .find(|(_, c)| *c == canonical)
        .map(|(native, _)| *native)
}

fn lookup(table: &[(&'static str, &'static str)], native: &str) -> Option<&'static str> {
    table.iter().find(|(n, _)| *n == native).map(|(_, c)| *c)
}

/// UIA control type id to its name (`UIA_ButtonControlTypeId` is 50000).
pub fn uia_control_type_name(id: i32) -> &'static str {
    match id {
        50000 => "Button",
        50001 => "Calendar",
        50002 => "CheckBox",
        50003 => "ComboBox",
        50004 => "Edit",
        50005 => "Hyperlink",
        50006 => "Image",
        50007 => "ListItem",
        50008 => "List",
        50009 => "Menu",
        50010 => "MenuBar",
        50011 => "MenuItem",
        50012 => "ProgressBar",
        50013 => "RadioButton",
        50014 => "ScrollBar",
        50015 => "Slider",
        50016 => "Spinner",
        50017 => "StatusBar",
        50018 => "Tab",
        50019 => "TabItem",
        50020 => "Text",
        50021 => "ToolBar",
        50022 => "ToolTip",
        50023 => "Tree",
        50024 => "TreeItem",
        50025 => "Custom",
        50026 => "Group",
        50027 => "Thumb",
        50028 => "DataGrid",
        50029 => "DataItem",
        50030 => "Document",
        50031 => "SplitButton",
        50032 => "Window",
        50033 => "Pane",
        50034 => "Header",
        50035 => "HeaderItem",
        50036 => "Table",
        50037 => "TitleBar",
        50038 => "Separator",
        _ => "Unknown",
    }
}
