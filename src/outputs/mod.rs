//! Output files written by the pipeline.
//!
//! # Submodules
//!
//! - [`csv`]: the link list written by discovery and the details dataset
//!   appended by extraction
//!
//! # Output Structure
//!
//! ```text
//! Data/
//! ├── company_links.csv   # index_number,company_url,region
//! └── company_data.csv    # company_name,...,product_url,region
//! ```

pub mod csv;
