pub mod cleanup; // Question cleanup pipeline
pub mod ollama;
