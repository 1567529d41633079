mod replconf;
