//! Macros for reducing boilerplate when defining records

/// Implement [`Record`](crate::core::record::Record) for a struct with an
/// `id: i64` field.
///
/// # Example
/// ```rust,ignore
/// pub static CONTINENTS: TableSpec = TableSpec { table: "continents", /* ... */ };
///
/// #[derive(Debug, Clone, sqlx::FromRow)]
/// pub struct Continent {
///     pub id: i64,
///     pub name: String,
/// }
///
/// impl_record!(Continent, "continent", CONTINENTS);
/// ```
#[macro_export]
macro_rules! impl_record {
    ($type:ident, $entity_type:literal, $spec:path) => {
        impl $crate::core::record::Record for $type {
            const ENTITY_TYPE: &'static str = $entity_type;

            fn table() -> &'static $crate::core::query_builder::TableSpec {
                &$spec
            }

            fn id(&self) -> i64 {
                self.id
            }
        }
    };
}

/// Declare a service type alias together with its record's `Record` impl.
///
/// ```rust,ignore
/// impl_service!(ContinentService, Continent, "continent", CONTINENTS);
/// // expands to impl_record!(...) and
/// // pub type ContinentService = EntityService<Continent>;
/// ```
#[macro_export]
macro_rules! impl_service {
    ($service:ident, $type:ident, $entity_type:literal, $spec:path) => {
        $crate::impl_record!($type, $entity_type, $spec);

        #[doc = concat!("Service for `", stringify!($type), "` records")]
        pub type $service = $crate::services::EntityService<$type>;
    };
}
