pub mod supabase;

pub use supabase::{SupabaseClient, in_filter};
