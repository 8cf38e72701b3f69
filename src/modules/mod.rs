pub mod books;

use shelf_db::DocumentDatabase;
use shelf_kernel::{settings::Settings, ModuleRegistry};

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, db: &dyn DocumentDatabase, settings: &Settings) {
    registry.register(books::create_module(
        db.collection(&settings.books.collection),
        &settings.books,
    ));
}
