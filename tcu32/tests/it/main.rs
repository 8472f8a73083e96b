mod filter;
mod selector;
