//! Model naming conventions.

/// Table name for a model type: an underscore before every capital letter,
/// lower-cased, with outer underscores trimmed. Any module path is dropped.
///
/// `UserProfile` -> `user_profile`, `app::models::MySuperModel` -> `my_super_model`.
pub fn table_name_from_type(type_name: &str) -> String {
    let short = type_name
        .rsplit(['\\', ':'])
        .next()
        .unwrap_or(type_name);

    let mut name = String::with_capacity(short.len() + 4);
    for c in short.chars() {
        if c.is_ascii_uppercase() {
            name.push('_');
        }
        name.push(c.to_ascii_lowercase());
    }
    name.trim_matches('_').to_string()
}

/// Types that map onto a database table.
pub trait Model {
    fn table_name() -> String {
        table_name_from_type(std::any::type_name::<Self>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(table_name_from_type("UserProfile"), "user_profile");
        assert_eq!(table_name_from_type("MySuperController"), "my_super_controller");
        assert_eq!(table_name_from_type("App\\Models\\Post"), "post");
        assert_eq!(table_name_from_type("crate::models::BlogPost"), "blog_post");
        assert_eq!(table_name_from_type("HTMLPage"), "h_t_m_l_page");
        assert_eq!(table_name_from_type("lower"), "lower");
    }

    #[test]
    fn test_trait_default_uses_type_name() {
        struct OrderItem;
        impl Model for OrderItem {}
        assert_eq!(OrderItem::table_name(), "order_item");
    }
}
