mod distance_tests;
mod serialization_tests;
