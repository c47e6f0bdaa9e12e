mod storage_error_tests;
