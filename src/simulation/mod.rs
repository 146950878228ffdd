pub mod market_gen;
